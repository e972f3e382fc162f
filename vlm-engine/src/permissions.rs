use std::collections::HashSet;

use tracing::warn;

use vlm_slo::Result;
use vlm_storage::{Group, GroupStore, Permission, User};

use crate::groups;

/// The group's own override when set, else the nearest overriding
/// ancestor's, else the global floor. The walk stops at the first
/// override, so a deep chain costs only as many reads as it must.
pub async fn resolve_group_permission(
    store: &impl GroupStore,
    group: &Group,
    floor: &Permission,
) -> Result<Permission> {
    if let Some(permission) = group.permission {
        return Ok(permission);
    }

    let mut seen = HashSet::from([group.id.clone()]);
    let mut parent_id = group.parent_id.clone();
    while let Some(id) = parent_id {
        if !seen.insert(id.clone()) {
            warn!("group {} ancestry loops back to {}", group.id, id);
            break;
        }
        let parent = match groups::load_parent(store, &group.id, &id).await?
        {
            Some(parent) => parent,
            None => break,
        };
        if let Some(permission) = parent.permission {
            return Ok(permission);
        }
        parent_id = parent.parent_id;
    }
    Ok(*floor)
}

/// Componentwise maximum over every membership. An extra membership can
/// widen the effective quota, never narrow it. Membership is expected to
/// be non-empty (every user sits at least in the default group of their
/// type); an empty set is logged and resolved to the floor.
pub async fn resolve_user_permission(
    store: &impl GroupStore,
    user: &User,
    floor: &Permission,
) -> Result<Permission> {
    let memberships = store.list_groups_of_user(&user.id).await?;
    if memberships.is_empty() {
        warn!("user {} belongs to no group, using the floor", user.id);
        return Ok(*floor);
    }

    let mut effective =
        resolve_group_permission(store, &memberships[0], floor).await?;
    for group in &memberships[1..] {
        let resolved =
            resolve_group_permission(store, group, floor).await?;
        effective = effective.max(&resolved);
    }
    Ok(effective)
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use vlm_storage::group::MockGroupStore;

    use super::*;

    const FLOOR: Permission = Permission {
        vm_count: 1,
        cpu_count: 1,
        memory_size: 512,
        disk_storage: 10240,
    };

    fn group(
        id: &str,
        parent_id: Option<&str>,
        permission: Option<Permission>,
    ) -> Group {
        Group {
            id: id.to_owned(),
            name: id.to_owned(),
            parent_id: parent_id.map(str::to_owned),
            permission,
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

    #[tokio::test]
    async fn root_without_override_resolves_to_the_floor() {
        let store = MockGroupStore::new();
        let resolved = resolve_group_permission(
            &store,
            &group("orphans", None, None),
            &FLOOR,
        )
        .await
        .unwrap();
        assert_eq!(resolved, FLOOR);
    }

    #[tokio::test]
    async fn own_override_wins_without_touching_ancestors() {
        let store = MockGroupStore::new();
        let own = Permission::new(4, 3, 512, 1024);
        let resolved = resolve_group_permission(
            &store,
            &group("cs101", Some("courses"), Some(own)),
            &FLOOR,
        )
        .await
        .unwrap();
        assert_eq!(resolved, own);
    }

    #[tokio::test]
    async fn missing_override_inherits_from_the_parent() {
        let mut store = MockGroupStore::new();
        let courses = Permission::new(5, 2, 2048, 10240);
        store
            .expect_get_group()
            .with(eq("courses"))
            .times(1)
            .returning(move |_| {
                Ok(group("courses", None, Some(courses)))
            });

        let resolved = resolve_group_permission(
            &store,
            &group("cs101", Some("courses"), None),
            &FLOOR,
        )
        .await
        .unwrap();
        assert_eq!(resolved, courses);
    }

    #[tokio::test]
    async fn ancestry_cycle_falls_back_to_the_floor() {
        let mut store = MockGroupStore::new();
        store
            .expect_get_group()
            .with(eq("b"))
            .times(1)
            .returning(|_| Ok(group("b", Some("a"), None)));

        let resolved = resolve_group_permission(
            &store,
            &group("a", Some("b"), None),
            &FLOOR,
        )
        .await
        .unwrap();
        assert_eq!(resolved, FLOOR);
    }

    #[tokio::test]
    async fn memberships_merge_componentwise() {
        let mut store = MockGroupStore::new();
        store.expect_list_groups_of_user().with(eq("u1")).returning(
            |_| {
                Ok(vec![
                    group("a", None, Some(Permission::new(5, 1, 2048, 0))),
                    group(
                        "b",
                        None,
                        Some(Permission::new(1, 8, 512, 40960)),
                    ),
                ])
            },
        );

        let resolved =
            resolve_user_permission(&store, &user("u1"), &FLOOR)
                .await
                .unwrap();

        assert_eq!(resolved, Permission::new(5, 8, 2048, 40960));
        for membership in [
            Permission::new(5, 1, 2048, 0),
            Permission::new(1, 8, 512, 40960),
        ] {
            assert_eq!(resolved.max(&membership), resolved);
        }
    }

    #[tokio::test]
    async fn membership_anomaly_resolves_to_the_floor() {
        let mut store = MockGroupStore::new();
        store
            .expect_list_groups_of_user()
            .returning(|_| Ok(vec![]));

        let resolved =
            resolve_user_permission(&store, &user("ghost"), &FLOOR)
                .await
                .unwrap();
        assert_eq!(resolved, FLOOR);
    }
}
