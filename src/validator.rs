//! Invariant checks that gate every kinship write.
//!
//! Each check takes the minimal facts the service gathered from the store
//! and decides whether the write keeps the graph plausible. None of them
//! touches the store.

use crate::error::KinshipError;
use crate::types::{PersonId, MAX_PARENTS};

/// Decide whether `parent` may become a parent of `child`.
///
/// Checks run in order: parent count, self relation, duplicate edge,
/// shared ancestry.
pub fn can_add_parent(
    parent: PersonId,
    child: PersonId,
    existing_parents: &[PersonId],
    has_common_ancestor: bool,
) -> Result<(), KinshipError> {
    if existing_parents.len() >= MAX_PARENTS {
        return Err(KinshipError::MaxParentsExceeded);
    }
    if parent == child {
        return Err(KinshipError::SelfRelation);
    }
    if existing_parents.contains(&parent) {
        return Err(KinshipError::DuplicateRelation);
    }
    if has_common_ancestor {
        return Err(KinshipError::IncestuousRelation);
    }
    Ok(())
}

/// Decide whether `first` and `second` may marry.
pub fn can_add_spouse(
    first: PersonId,
    second: PersonId,
    have_common_child: bool,
    first_spouse: Option<PersonId>,
    second_spouse: Option<PersonId>,
) -> Result<(), KinshipError> {
    if first == second {
        return Err(KinshipError::SelfRelation);
    }
    if !have_common_child {
        return Err(KinshipError::NoCommonChild);
    }
    check_current_spouse(first_spouse, second)?;
    check_current_spouse(second_spouse, first)
}

fn check_current_spouse(
    current: Option<PersonId>,
    proposed: PersonId,
) -> Result<(), KinshipError> {
    match current {
        None => Ok(()),
        Some(spouse) if spouse == proposed => Err(KinshipError::AlreadySpouses),
        Some(_) => Err(KinshipError::SpouseAlreadyAssigned),
    }
}

/// Decide whether a PARENT edge into a child may be removed.
///
/// `marital_sibling_count` is the number of children shared by the child's
/// two parents when those parents are married to each other, and zero
/// otherwise. Removing the edge of the only such child would leave the
/// marriage without the common child it was created on.
pub fn can_delete_parent_relation(marital_sibling_count: usize) -> Result<(), KinshipError> {
    if marital_sibling_count == 1 {
        return Err(KinshipError::SoleChildOfMarriedCouple);
    }
    Ok(())
}

/// Decide whether a person may be deleted.
pub fn can_delete_person(still_has_relations: bool) -> Result<(), KinshipError> {
    if still_has_relations {
        return Err(KinshipError::PersonHasRelations);
    }
    Ok(())
}
