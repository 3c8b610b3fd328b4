use super::*;

#[test]
fn new_embedding_gets_fresh_identity() {
    let document_id = Uuid::new_v4();
    let group_id = Uuid::new_v4();

    let first = DocumentEmbedding::new(document_id, group_id, vec![0.1, 0.2, 0.3]);
    let second = DocumentEmbedding::new(document_id, group_id, vec![0.1, 0.2, 0.3]);

    assert_eq!(first.document_id, document_id);
    assert_eq!(first.group_id, group_id);
    assert_eq!(first.vector.len(), 3);
    assert_ne!(first.id, second.id);
}

#[test]
fn score_is_complement_of_distance() {
    let document_id = Uuid::new_v4();

    let exact = DocumentScore::from_distance(document_id, 0.0);
    assert_eq!(exact.score, 1.0);

    let orthogonal = DocumentScore::from_distance(document_id, 1.0);
    assert_eq!(orthogonal.score, 0.0);

    let near = DocumentScore::from_distance(document_id, 0.25);
    assert!(near.score > orthogonal.score);
    assert!(near.score < exact.score);
}

#[test]
fn embedding_serialization() {
    let embedding = DocumentEmbedding::new(Uuid::new_v4(), Uuid::new_v4(), vec![0.5, -0.5]);

    let json = serde_json::to_string(&embedding).expect("should serialize embedding");
    let parsed: DocumentEmbedding = serde_json::from_str(&json).expect("should parse embedding");

    assert_eq!(parsed, embedding);
}
