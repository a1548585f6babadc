//! Tests for forking and three-way upstream merges

use forge_registry::config::ForgeConfig;
use forge_registry::definition::{DefinitionKind, Source};
use forge_registry::error::ErrorKind;
use forge_registry::fork::MergeStrategy;
use forge_registry::forge::Forge;
use forge_registry::layout::StorageLayout;
use forge_test_utils::{TestRegistry, yaml};

const FORK: &str = "my-researcher";
const FORK_FILE: &str = ".fractary/agents/my-researcher.yaml";

fn forge(registry: &TestRegistry) -> Forge {
    Forge::with_parts(
        StorageLayout::new(registry.project_root(), registry.global_root()),
        ForgeConfig::default(),
        None,
    )
}

fn publish(registry: &TestRegistry, version: &str, extra: &str) {
    registry.write_global("agents", "researcher", version, "yaml", &yaml::agent("researcher", version, extra));
}

fn edit_fork(registry: &TestRegistry, edit: impl FnOnce(String) -> String) {
    let content = registry.read_project(FORK_FILE);
    std::fs::write(registry.project_root().join(FORK_FILE), edit(content)).unwrap();
}

/// Fork `researcher@1.0.0`, then publish `1.1.0` with `upstream_extra`.
async fn forked(upstream_extra: &str) -> (TestRegistry, Forge) {
    let registry = TestRegistry::new();
    publish(&registry, "1.0.0", "");
    let forge = forge(&registry);
    forge
        .forks()
        .fork("researcher", DefinitionKind::Agent, FORK, false)
        .await
        .unwrap();
    publish(&registry, "1.1.0", upstream_extra);
    forge.resolver().clear_cache();
    (registry, forge)
}

mod fork_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_fork_records_provenance() {
        let registry = TestRegistry::new();
        publish(&registry, "1.0.0", "");
        let forge = forge(&registry);

        let result = forge
            .forks()
            .fork("researcher", DefinitionKind::Agent, FORK, false)
            .await
            .unwrap();

        assert_eq!(result.source_name, "researcher");
        assert_eq!(result.source_version, "1.0.0");
        registry.assert_project_file_exists(FORK_FILE);

        let resolved = forge.resolve(FORK, DefinitionKind::Agent).await.unwrap();
        assert_eq!(resolved.source, Source::Local);
        assert_eq!(resolved.name(), FORK);
        let fork_of = resolved.definition.fork_of().unwrap();
        assert_eq!(fork_of.name, "researcher");
        assert_eq!(fork_of.version, "1.0.0");

        let forks = forge
            .forks()
            .manifests()
            .forks_of(DefinitionKind::Agent, "researcher")
            .unwrap();
        assert_eq!(forks.len(), 1);
        assert_eq!(forks[0].name, FORK);
    }

    #[tokio::test]
    async fn test_fork_refuses_to_overwrite_without_force() {
        let registry = TestRegistry::new();
        publish(&registry, "1.0.0", "");
        let forge = forge(&registry);
        let forks = forge.forks();
        forks.fork("researcher", DefinitionKind::Agent, FORK, false).await.unwrap();

        let err = forks
            .fork("researcher", DefinitionKind::Agent, FORK, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ForkExists);

        assert!(forks.fork("researcher", DefinitionKind::Agent, FORK, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_forced_fork_replaces_markdown_definition() {
        let registry = TestRegistry::new();
        publish(&registry, "1.0.0", "");
        let stale = registry.write_local("agents", FORK, "md", &yaml::markdown_agent(FORK, "9.9.9", "Old prompt."));
        let forge = forge(&registry);

        forge
            .forks()
            .fork("researcher", DefinitionKind::Agent, FORK, true)
            .await
            .unwrap();

        assert!(!stale.exists());
        registry.assert_project_file_exists(FORK_FILE);
        let resolved = forge.resolve(FORK, DefinitionKind::Agent).await.unwrap();
        assert_eq!(resolved.version, "1.0.0");
        assert_eq!(resolved.definition.fork_of().unwrap().name, "researcher");
    }

    #[tokio::test]
    async fn test_invalid_fork_name_is_rejected() {
        let registry = TestRegistry::new();
        publish(&registry, "1.0.0", "");

        let err = forge(&registry)
            .forks()
            .fork("researcher", DefinitionKind::Agent, "bad name!", false)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidName);
    }
}

mod update_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_check_for_updates_sees_new_upstream() {
        let (_registry, forge) = forked("").await;

        let check = forge
            .forks()
            .check_for_updates(FORK, DefinitionKind::Agent)
            .await
            .unwrap();

        assert!(check.has_update);
        assert_eq!(check.forked_version, "1.0.0");
        assert_eq!(check.latest_version, "1.1.0");
    }

    #[tokio::test]
    async fn test_plain_definition_is_not_a_fork() {
        let registry = TestRegistry::new();
        registry.write_local("agents", "plain", "yaml", &yaml::agent("plain", "1.0.0", ""));

        let err = forge(&registry)
            .forks()
            .check_for_updates("plain", DefinitionKind::Agent)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotAFork);
    }
}

mod merge_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_clean_merge_combines_both_sides() {
        let (registry, forge) = forked("tags: [upstream]\n").await;
        edit_fork(&registry, |content| {
            content.replace("description: researcher agent", "description: Tuned locally")
        });
        forge.resolver().clear_cache();

        let outcome = forge
            .forks()
            .merge_upstream(FORK, DefinitionKind::Agent, None)
            .await
            .unwrap();

        assert!(outcome.result.success);
        assert!(outcome.written);
        assert_eq!(outcome.to_version, "1.1.0");

        let merged = forge.resolve(FORK, DefinitionKind::Agent).await.unwrap();
        assert_eq!(merged.version, "1.1.0");
        assert_eq!(merged.definition.description(), "Tuned locally");
        assert_eq!(merged.definition.tags(), ["upstream".to_string()]);
        assert_eq!(merged.definition.fork_of().unwrap().version, "1.1.0");
        assert!(merged.definition.fork_of().unwrap().merged_at.is_some());
    }

    #[tokio::test]
    async fn test_conflict_is_reported_and_not_written() {
        let (registry, forge) = forked("").await;
        std::fs::write(
            registry.global_root().join("registry/agents/researcher@1.1.0/agent.yaml"),
            yaml::agent("researcher", "1.1.0", "").replace("researcher agent", "Upstream"),
        )
        .unwrap();
        edit_fork(&registry, |content| content.replace("researcher agent", "Local"));
        forge.resolver().clear_cache();
        let before = registry.read_project(FORK_FILE);

        let outcome = forge
            .forks()
            .merge_upstream(FORK, DefinitionKind::Agent, None)
            .await
            .unwrap();

        assert!(!outcome.result.success);
        assert!(!outcome.written);
        assert_eq!(outcome.result.conflicts.len(), 1);
        let conflict = &outcome.result.conflicts[0];
        assert_eq!(conflict.path.to_string(), "description");
        assert_eq!(conflict.base, Some("researcher agent".into()));
        assert_eq!(conflict.local, Some("Local".into()));
        assert_eq!(conflict.upstream, Some("Upstream".into()));
        assert_eq!(registry.read_project(FORK_FILE), before);
    }

    #[tokio::test]
    async fn test_strategy_resolves_conflicts() {
        let (registry, forge) = forked("").await;
        std::fs::write(
            registry.global_root().join("registry/agents/researcher@1.1.0/agent.yaml"),
            yaml::agent("researcher", "1.1.0", "").replace("researcher agent", "Upstream"),
        )
        .unwrap();
        edit_fork(&registry, |content| content.replace("researcher agent", "Local"));
        forge.resolver().clear_cache();

        let outcome = forge
            .forks()
            .merge_upstream(FORK, DefinitionKind::Agent, Some(MergeStrategy::Local))
            .await
            .unwrap();

        assert!(outcome.result.success);
        assert!(outcome.written);
        assert_eq!(outcome.result.strategy, Some(MergeStrategy::Local));

        let merged = forge.resolve(FORK, DefinitionKind::Agent).await.unwrap();
        assert_eq!(merged.definition.description(), "Local");
        assert_eq!(merged.version, "1.1.0");
    }
}
