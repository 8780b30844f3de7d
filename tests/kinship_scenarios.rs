//! End-to-end scenarios for the kinship service.
//!
//! Every test drives `KinshipService` over the in-memory store and checks
//! both the returned outcome and the committed graph.

use std::sync::Arc;
use std::time::Duration;

use kinship_kernel::store::InMemoryGraphStore;
use kinship_kernel::{
    FailureKind, GraphSession, GraphStore, KinshipError, KinshipService, PaginationDetails, PersonId, Relation,
    SessionMode,
};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

type Service = KinshipService<InMemoryGraphStore>;

fn make_service() -> Service {
    KinshipService::new(Arc::new(InMemoryGraphStore::new()))
}

async fn person(service: &Service, name: &str) -> PersonId {
    service.create_person(name).await.unwrap().id
}

fn kind<T: std::fmt::Debug>(result: Result<T, KinshipError>) -> FailureKind {
    result.unwrap_err().kind()
}

/// Two married parents with one child.
async fn married_couple_with_child(service: &Service) -> (PersonId, PersonId, PersonId) {
    let mother = person(service, "Mother").await;
    let father = person(service, "Father").await;
    let child = person(service, "Child").await;
    service.create_parent_relation(mother, child).await.unwrap();
    service.create_parent_relation(father, child).await.unwrap();
    service.create_spouse_relation(mother, father).await.unwrap();
    (mother, father, child)
}

// ─────────────────────────────────────────────────────────────────────────────
// Parent relations
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_incestuous_parent_is_rejected() {
    let service = make_service();

    let alice = person(&service, "Alice").await;
    let bob = person(&service, "Bob").await;
    let carol = person(&service, "Carol").await;
    service.create_parent_relation(alice, carol).await.unwrap();
    service.create_parent_relation(bob, carol).await.unwrap();

    service.create_spouse_relation(alice, bob).await.unwrap();

    let dave = person(&service, "Dave").await;
    service.create_parent_relation(carol, dave).await.unwrap();

    let result = service.create_parent_relation(alice, dave).await;
    assert_eq!(kind(result), FailureKind::IncestuousRelation);

    let graph = service.store().snapshot().await;
    assert_eq!(graph.parents_of(dave), vec![carol]);
}

#[tokio::test]
async fn test_third_parent_rejected_in_any_order() {
    let service = make_service();
    let child = person(&service, "Child").await;
    let first = person(&service, "First").await;
    let second = person(&service, "Second").await;
    let third = person(&service, "Third").await;

    service.create_parent_relation(third, child).await.unwrap();
    service.create_parent_relation(first, child).await.unwrap();

    let result = service.create_parent_relation(second, child).await;
    assert_eq!(kind(result), FailureKind::MaxParentsExceeded);
}

#[tokio::test]
async fn test_self_and_duplicate_parent() {
    let service = make_service();
    let parent = person(&service, "Parent").await;
    let child = person(&service, "Child").await;

    assert_eq!(
        kind(service.create_parent_relation(child, child).await),
        FailureKind::SelfRelation
    );

    service.create_parent_relation(parent, child).await.unwrap();
    assert_eq!(
        kind(service.create_parent_relation(parent, child).await),
        FailureKind::DuplicateRelation
    );
}

#[tokio::test]
async fn test_descendant_cannot_become_parent() {
    let service = make_service();
    let grandparent = person(&service, "Grandparent").await;
    let parent = person(&service, "Parent").await;
    let child = person(&service, "Child").await;
    service.create_parent_relation(grandparent, parent).await.unwrap();
    service.create_parent_relation(parent, child).await.unwrap();

    // Would close a cycle
    let result = service.create_parent_relation(child, grandparent).await;
    assert_eq!(kind(result), FailureKind::IncestuousRelation);
}

#[tokio::test]
async fn test_unknown_people_are_reported_first() {
    let service = make_service();
    let known = person(&service, "Known").await;
    let ghost = PersonId::new(Uuid::from_u128(404));

    assert_eq!(
        kind(service.create_parent_relation(known, ghost).await),
        FailureKind::PersonNotFound
    );
    assert_eq!(
        kind(service.create_spouse_relation(ghost, known).await),
        FailureKind::PersonNotFound
    );
    assert_eq!(
        kind(service.delete_parent_relation(known, ghost).await),
        FailureKind::PersonNotFound
    );
    assert_eq!(kind(service.family_tree(ghost).await), FailureKind::PersonNotFound);
}

// ─────────────────────────────────────────────────────────────────────────────
// Spouse relations
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_spouses_need_a_common_child() {
    let service = make_service();
    let a = person(&service, "A").await;
    let b = person(&service, "B").await;

    assert_eq!(kind(service.create_spouse_relation(a, b).await), FailureKind::NoCommonChild);

    let child = person(&service, "Child").await;
    service.create_parent_relation(a, child).await.unwrap();
    service.create_parent_relation(b, child).await.unwrap();
    service.create_spouse_relation(a, b).await.unwrap();

    let graph = service.store().snapshot().await;
    assert_eq!(graph.spouse_of(a), Some(b));
    assert_eq!(graph.spouse_of(b), Some(a));
}

#[tokio::test]
async fn test_spouse_rules() {
    let service = make_service();
    let (mother, father, _) = married_couple_with_child(&service).await;

    assert_eq!(
        kind(service.create_spouse_relation(father, mother).await),
        FailureKind::AlreadySpouses
    );
    assert_eq!(
        kind(service.create_spouse_relation(mother, mother).await),
        FailureKind::SelfRelation
    );

    // Father also has a child with someone else
    let other = person(&service, "Other").await;
    let half_sibling = person(&service, "Half").await;
    service.create_parent_relation(father, half_sibling).await.unwrap();
    service.create_parent_relation(other, half_sibling).await.unwrap();
    assert_eq!(
        kind(service.create_spouse_relation(other, father).await),
        FailureKind::SpouseAlreadyAssigned
    );
}

#[tokio::test]
async fn test_delete_spouse_either_direction() {
    let service = make_service();
    let (mother, father, _) = married_couple_with_child(&service).await;

    service.delete_spouse_relation(father, mother).await.unwrap();
    assert_eq!(
        kind(service.delete_spouse_relation(mother, father).await),
        FailureKind::RelationNotFound
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Deletions
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_only_child_of_married_couple_keeps_parents() {
    let service = make_service();
    let (mother, father, child) = married_couple_with_child(&service).await;

    assert_eq!(
        kind(service.delete_parent_relation(mother, child).await),
        FailureKind::SoleChildOfMarriedCouple
    );

    let second = person(&service, "Second").await;
    service.create_parent_relation(mother, second).await.unwrap();
    service.create_parent_relation(father, second).await.unwrap();

    service.delete_parent_relation(mother, child).await.unwrap();
    let graph = service.store().snapshot().await;
    assert_eq!(graph.parents_of(child), vec![father]);
}

#[tokio::test]
async fn test_unmarried_parents_can_drop_only_child() {
    let service = make_service();
    let a = person(&service, "A").await;
    let b = person(&service, "B").await;
    let child = person(&service, "Child").await;
    service.create_parent_relation(a, child).await.unwrap();
    service.create_parent_relation(b, child).await.unwrap();

    service.delete_parent_relation(a, child).await.unwrap();
    assert_eq!(
        kind(service.delete_parent_relation(a, child).await),
        FailureKind::RelationNotFound
    );
}

#[tokio::test]
async fn test_delete_person_requires_no_relations() {
    let service = make_service();
    let parent = person(&service, "Parent").await;
    let child = person(&service, "Child").await;
    service.create_parent_relation(parent, child).await.unwrap();

    assert_eq!(kind(service.delete_person(child).await), FailureKind::PersonHasRelations);

    service.delete_parent_relation(parent, child).await.unwrap();
    service.delete_person(child).await.unwrap();
    assert_eq!(kind(service.get_person(child).await), FailureKind::PersonNotFound);
    assert_eq!(kind(service.delete_person(child).await), FailureKind::PersonNotFound);
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_bacons_number() {
    let service = make_service();
    let (mother, father, child) = married_couple_with_child(&service).await;
    let grandchild = person(&service, "Grandchild").await;
    service.create_parent_relation(child, grandchild).await.unwrap();
    let stranger = person(&service, "Stranger").await;

    assert_eq!(service.bacons_number(mother, mother).await.unwrap(), Some(0));
    assert_eq!(service.bacons_number(mother, father).await.unwrap(), Some(1));
    assert_eq!(service.bacons_number(grandchild, father).await.unwrap(), Some(2));
    assert_eq!(service.bacons_number(father, grandchild).await.unwrap(), Some(2));
    assert_eq!(service.bacons_number(stranger, mother).await.unwrap(), None);
}

#[tokio::test]
async fn test_people_pagination() {
    let service = make_service();
    for i in 0..12 {
        person(&service, &format!("Person {}", i)).await;
    }

    let first = service.get_people(PaginationDetails::new(-1, 0)).await.unwrap();
    assert_eq!(first.page, 0);
    assert_eq!(first.content.len(), 10);
    assert_eq!(first.total_items, 12);

    let second = service.get_people(PaginationDetails::new(1, 10)).await.unwrap();
    assert_eq!(second.content.len(), 2);

    let capped = service.get_people(PaginationDetails::new(0, 500)).await.unwrap();
    assert_eq!(capped.content.len(), 12);
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_timeout_while_writer_holds_the_store() {
    let store = Arc::new(InMemoryGraphStore::new());
    let service = KinshipService::new(Arc::clone(&store)).with_operation_timeout(Duration::from_millis(25));
    let alice = service.create_person("Alice").await.unwrap().id;

    let mut writer = store.open_session(SessionMode::Write).await.unwrap();
    let bob = writer.save_person("Bob").await.unwrap();

    assert_eq!(kind(service.get_person(alice).await), FailureKind::Timeout);

    // The held session never commits
    writer.close().await;
    assert_eq!(kind(service.get_person(bob.id).await), FailureKind::PersonNotFound);
    assert!(service.get_person(alice).await.is_ok());
}

#[tokio::test]
async fn test_concurrent_writers_serialize() {
    let service = make_service();
    let child = person(&service, "Child").await;
    let mut parents = Vec::new();
    for i in 0..4 {
        parents.push(person(&service, &format!("Parent {}", i)).await);
    }

    let handles: Vec<_> = parents
        .iter()
        .map(|&parent| {
            let service = service.clone();
            tokio::spawn(async move { service.create_parent_relation(parent, child).await })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => accepted += 1,
            Err(e) => assert_eq!(e.kind(), FailureKind::MaxParentsExceeded),
        }
    }

    assert_eq!(accepted, 2);
    let graph = service.store().snapshot().await;
    assert_eq!(graph.parents_of(child).len(), 2);
    assert!(graph
        .relations()
        .iter()
        .all(|r| *r == Relation::parent(r.from, child)));
}
