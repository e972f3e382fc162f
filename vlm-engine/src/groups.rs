use std::collections::{HashSet, VecDeque};

use tracing::warn;

use vlm_slo::{errors::Code, Result};
use vlm_storage::{Group, GroupStore, User};

/// Loads one parent link. A dangling id is logged and treated as the end
/// of the chain, every other store failure propagates.
pub(crate) async fn load_parent(
    store: &impl GroupStore,
    child: &str,
    id: &str,
) -> Result<Option<Group>> {
    match store.get_group(id).await {
        Ok(group) => Ok(Some(group)),
        Err(err) => match err.into() {
            Code::NotFound(_) => {
                warn!(
                    "group {} ancestry references missing group {}",
                    child, id
                );
                Ok(None)
            }
            code => Err(code.into()),
        },
    }
}

/// The group itself first, then each ancestor up to the root. Stored
/// parent links are expected to form a forest, but the walk survives a
/// cycle: a repeated id ends the chain with a log line instead of
/// looping.
pub async fn ancestor_chain(
    store: &impl GroupStore,
    group: &Group,
) -> Result<Vec<Group>> {
    let mut chain = vec![group.clone()];
    let mut seen = HashSet::from([group.id.clone()]);
    let mut parent_id = group.parent_id.clone();

    while let Some(id) = parent_id {
        if !seen.insert(id.clone()) {
            warn!("group {} ancestry loops back to {}", group.id, id);
            break;
        }
        let parent = match load_parent(store, &group.id, &id).await? {
            Some(parent) => parent,
            None => break,
        };
        parent_id = parent.parent_id.clone();
        chain.push(parent);
    }
    Ok(chain)
}

/// Transitive children, breadth first, cycle-guarded like
/// [`ancestor_chain`].
pub async fn collect_descendants(
    store: &impl GroupStore,
    group: &Group,
) -> Result<Vec<Group>> {
    let mut seen = HashSet::from([group.id.clone()]);
    let mut queue = VecDeque::from([group.id.clone()]);
    let mut descendants = Vec::new();

    while let Some(id) = queue.pop_front() {
        for child in store.list_children(&id).await? {
            if !seen.insert(child.id.clone()) {
                warn!(
                    "group {} appears twice below {}",
                    child.id, group.id
                );
                continue;
            }
            queue.push_back(child.id.clone());
            descendants.push(child);
        }
    }
    Ok(descendants)
}

/// Users attached to the group, plus to every descendant when
/// `recursive`, deduplicated by user id.
pub async fn collect_members(
    store: &impl GroupStore,
    group: &Group,
    recursive: bool,
) -> Result<Vec<User>> {
    let mut sources = vec![group.clone()];
    if recursive {
        sources.extend(collect_descendants(store, group).await?);
    }

    let mut seen = HashSet::new();
    let mut members = Vec::new();
    for source in &sources {
        for user in store.list_direct_members(&source.id).await? {
            if seen.insert(user.id.clone()) {
                members.push(user);
            }
        }
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use vlm_slo::errors;
    use vlm_storage::group::MockGroupStore;

    use super::*;

    fn group(id: &str, parent_id: Option<&str>) -> Group {
        Group {
            id: id.to_owned(),
            name: id.to_owned(),
            parent_id: parent_id.map(str::to_owned),
            ..Default::default()
        }
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_owned(),
            login: format!("{}@lab", id),
            ..Default::default()
        }
    }

    fn ids(groups: &[Group]) -> Vec<&str> {
        groups.iter().map(|value| value.id.as_str()).collect()
    }

    #[tokio::test]
    async fn chain_walks_to_the_root() {
        let mut store = MockGroupStore::new();
        store
            .expect_get_group()
            .with(eq("b"))
            .times(1)
            .returning(|_| Ok(group("b", Some("a"))));
        store
            .expect_get_group()
            .with(eq("a"))
            .times(1)
            .returning(|_| Ok(group("a", None)));

        let chain =
            ancestor_chain(&store, &group("c", Some("b"))).await.unwrap();
        assert_eq!(ids(&chain), ["c", "b", "a"]);
    }

    #[tokio::test]
    async fn chain_survives_a_parent_cycle() {
        let mut store = MockGroupStore::new();
        store
            .expect_get_group()
            .with(eq("b"))
            .times(1)
            .returning(|_| Ok(group("b", Some("a"))));

        let chain =
            ancestor_chain(&store, &group("a", Some("b"))).await.unwrap();
        assert_eq!(ids(&chain), ["a", "b"]);
    }

    #[tokio::test]
    async fn missing_parent_ends_the_chain() {
        let mut store = MockGroupStore::new();
        store
            .expect_get_group()
            .with(eq("b"))
            .times(1)
            .returning(|id| Err(errors::not_found(id)));

        let chain =
            ancestor_chain(&store, &group("a", Some("b"))).await.unwrap();
        assert_eq!(ids(&chain), ["a"]);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let mut store = MockGroupStore::new();
        store
            .expect_get_group()
            .returning(|_| Err(errors::anyhow(anyhow::anyhow!("db down"))));

        assert!(ancestor_chain(&store, &group("a", Some("b")))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn descendants_are_collected_breadth_first() {
        let mut store = MockGroupStore::new();
        store
            .expect_list_children()
            .with(eq("root"))
            .returning(|_| Ok(vec![group("a", Some("root")), group("b", Some("root"))]));
        store
            .expect_list_children()
            .with(eq("a"))
            .returning(|_| Ok(vec![group("c", Some("a"))]));
        store
            .expect_list_children()
            .with(eq("b"))
            .returning(|_| Ok(vec![]));
        store
            .expect_list_children()
            .with(eq("c"))
            .returning(|_| Ok(vec![]));

        let descendants =
            collect_descendants(&store, &group("root", None)).await.unwrap();
        assert_eq!(ids(&descendants), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn members_are_deduplicated_across_groups() {
        let mut store = MockGroupStore::new();
        store
            .expect_list_children()
            .with(eq("root"))
            .returning(|_| Ok(vec![group("a", Some("root"))]));
        store
            .expect_list_children()
            .with(eq("a"))
            .returning(|_| Ok(vec![]));
        store
            .expect_list_direct_members()
            .with(eq("root"))
            .returning(|_| Ok(vec![user("u1"), user("u2")]));
        store
            .expect_list_direct_members()
            .with(eq("a"))
            .returning(|_| Ok(vec![user("u2"), user("u3")]));

        let members =
            collect_members(&store, &group("root", None), true)
                .await
                .unwrap();
        let member_ids: Vec<&str> =
            members.iter().map(|value| value.id.as_str()).collect();
        assert_eq!(member_ids, ["u1", "u2", "u3"]);
    }

    #[tokio::test]
    async fn direct_membership_skips_descendants() {
        let mut store = MockGroupStore::new();
        store
            .expect_list_direct_members()
            .with(eq("root"))
            .returning(|_| Ok(vec![user("u1")]));

        let members =
            collect_members(&store, &group("root", None), false)
                .await
                .unwrap();
        assert_eq!(members.len(), 1);
    }
}
