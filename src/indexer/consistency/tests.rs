use super::*;
use crate::database::DocumentEmbedding;
use crate::indexer::{DocumentCommand, channel};
use crate::test_support::{InMemoryDocuments, InMemoryEmbeddings};

fn report(missing: Vec<Uuid>, orphaned: Vec<Uuid>) -> ConsistencyReport {
    ConsistencyReport {
        group_id: Uuid::new_v4(),
        documents: 3,
        embeddings: 2,
        missing,
        orphaned,
    }
}

#[test]
fn consistent_report() {
    let report = report(vec![], vec![]);

    assert!(report.is_consistent());
    assert_eq!(report.total_issues(), 0);
    assert!(report.summary().contains("is consistent"));
}

#[test]
fn inconsistent_report_summary() {
    let report = report(vec![Uuid::new_v4(), Uuid::new_v4()], vec![Uuid::new_v4()]);

    assert!(!report.is_consistent());
    assert_eq!(report.total_issues(), 3);
    assert!(report.summary().contains("3 inconsistencies"));
    assert!(report.summary().contains("2 documents without embedding"));
}

#[tokio::test]
async fn validate_finds_missing_and_orphaned() {
    let documents = InMemoryDocuments::default();
    let embeddings = InMemoryEmbeddings::default();
    let group_id = Uuid::new_v4();

    let embedded = documents.markdown(group_id, "a.md", "a").await;
    let unembedded = documents.markdown(group_id, "b.md", "b").await;
    let orphan_id = Uuid::new_v4();

    for document_id in [embedded.id, orphan_id] {
        embeddings
            .create_embedding(DocumentEmbedding::new(
                document_id,
                group_id,
                vec![1.0, 0.0, 0.0, 0.0],
            ))
            .await
            .expect("should store embedding");
    }

    let validator = ConsistencyValidator::new(&documents, &embeddings);
    let report = validator
        .validate_group(group_id)
        .await
        .expect("validation should succeed");

    assert_eq!(report.documents, 2);
    assert_eq!(report.embeddings, 2);
    assert_eq!(report.missing, vec![unembedded.id]);
    assert_eq!(report.orphaned, vec![orphan_id]);
}

#[tokio::test]
async fn validate_ignores_other_groups() {
    let documents = InMemoryDocuments::default();
    let embeddings = InMemoryEmbeddings::default();
    let group_id = Uuid::new_v4();

    let document = documents.markdown(group_id, "a.md", "a").await;
    embeddings
        .create_embedding(DocumentEmbedding::new(
            document.id,
            group_id,
            vec![1.0, 0.0, 0.0, 0.0],
        ))
        .await
        .expect("should store embedding");
    documents.markdown(Uuid::new_v4(), "other.md", "b").await;

    let report = ConsistencyValidator::new(&documents, &embeddings)
        .validate_group(group_id)
        .await
        .expect("validation should succeed");

    assert!(report.is_consistent());
}

#[tokio::test]
async fn repair_enqueues_create_and_delete() {
    let documents = InMemoryDocuments::default();
    let embeddings = InMemoryEmbeddings::default();
    let missing = Uuid::new_v4();
    let orphaned = Uuid::new_v4();
    let report = ConsistencyReport {
        group_id: Uuid::new_v4(),
        documents: 1,
        embeddings: 1,
        missing: vec![missing],
        orphaned: vec![orphaned],
    };

    let (queue, mut receiver) = channel(4);
    let queued = ConsistencyValidator::new(&documents, &embeddings)
        .repair(&report, &queue)
        .await
        .expect("repair should enqueue");
    drop(queue);

    assert_eq!(queued, 2);

    let first = receiver.recv().await.expect("should receive create");
    assert_eq!(first.command, DocumentCommand::Create);
    assert_eq!(first.document_id, missing);
    assert_eq!(first.group_id, report.group_id);

    let second = receiver.recv().await.expect("should receive delete");
    assert_eq!(second.command, DocumentCommand::Delete);
    assert_eq!(second.document_id, orphaned);

    assert!(receiver.recv().await.is_none());
}
