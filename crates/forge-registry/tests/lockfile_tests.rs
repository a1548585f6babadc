//! Tests for lockfile generation, update and drift verification

use forge_registry::config::ForgeConfig;
use forge_registry::definition::{DefinitionKind, Source};
use forge_registry::error::ErrorKind;
use forge_registry::forge::Forge;
use forge_registry::layout::StorageLayout;
use forge_registry::lockfile::{Drift, calculate_integrity};
use forge_test_utils::{TestRegistry, yaml};

fn forge(registry: &TestRegistry, config: ForgeConfig) -> Forge {
    Forge::with_parts(
        StorageLayout::new(registry.project_root(), registry.global_root()),
        config,
        None,
    )
}

/// Two local tools and one globally installed agent referenced from config.
fn project() -> (TestRegistry, ForgeConfig) {
    let registry = TestRegistry::new();
    registry.write_local("tools", "fetch", "yaml", &yaml::tool("fetch", "1.0.0", ""));
    registry.write_local("tools", "parse", "yaml", &yaml::tool("parse", "0.3.0", "depends_on: [fetch]\n"));
    registry.write_global("agents", "writer", "1.0.0", "yaml", &yaml::agent("writer", "1.0.0", ""));
    registry.write_global("agents", "writer", "2.0.0", "yaml", &yaml::agent("writer", "2.0.0", ""));

    let config = ForgeConfig {
        agents: vec!["writer@^1".to_string()],
        ..ForgeConfig::default()
    };
    (registry, config)
}

mod generate_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_generate_locks_local_and_configured_definitions() {
        let (registry, config) = project();
        let forge = forge(&registry, config);

        let report = forge.lockfile().generate(false).await.unwrap();

        assert!(report.skipped.is_empty());
        let lockfile = &report.lockfile;
        assert_eq!(lockfile.version, 1);
        assert_eq!(lockfile.tools.keys().collect::<Vec<_>>(), vec!["fetch", "parse"]);
        assert_eq!(lockfile.agents["writer"].version, "1.0.0");
        assert_eq!(lockfile.agents["writer"].resolved, Source::Global);

        let fetch = forge.resolve("fetch", DefinitionKind::Tool).await.unwrap();
        assert_eq!(
            lockfile.tools["fetch"].integrity,
            calculate_integrity(&fetch.definition).unwrap()
        );

        registry.assert_project_file_exists(".fractary/forge-lock.json");
        let on_disk = forge.lockfile().load().unwrap().unwrap();
        assert_eq!(on_disk.tools, lockfile.tools);
        assert_eq!(on_disk.agents, lockfile.agents);
    }

    #[tokio::test]
    async fn test_existing_lockfile_requires_force() {
        let (registry, config) = project();
        let forge = forge(&registry, config);
        forge.lockfile().generate(false).await.unwrap();

        let err = forge.lockfile().generate(false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockfileExists);

        assert!(forge.lockfile().generate(true).await.is_ok());
    }

    #[tokio::test]
    async fn test_unresolvable_reference_is_skipped() {
        let (registry, mut config) = project();
        config.tools.push("ghost@^1".to_string());
        let forge = forge(&registry, config);

        let report = forge.lockfile().generate(false).await.unwrap();

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].query, "ghost@^1");
        assert_eq!(report.skipped[0].code, "TOOL_NOT_FOUND");
        assert!(!report.lockfile.tools.contains_key("ghost"));
    }
}

mod verify_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_missing_lockfile_verifies_clean() {
        let (registry, config) = project();
        let report = forge(&registry, config).lockfile().verify().await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.checked, 0);
    }

    #[tokio::test]
    async fn test_unchanged_project_has_no_drift() {
        let (registry, config) = project();
        let forge = forge(&registry, config);
        forge.lockfile().generate(false).await.unwrap();

        let report = forge.lockfile().verify().await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.checked, 3);
    }

    #[tokio::test]
    async fn test_edits_are_reported_as_drift() {
        let (registry, config) = project();
        let forge = forge(&registry, config);
        forge.lockfile().generate(false).await.unwrap();

        registry.write_local("tools", "fetch", "yaml", &yaml::tool("fetch", "1.0.0", "tags: [edited]\n"));
        registry.write_local("tools", "parse", "yaml", &yaml::tool("parse", "0.4.0", ""));
        forge.resolver().clear_cache();

        let report = forge.lockfile().verify().await.unwrap();

        assert_eq!(report.drift.len(), 2);
        let fetch = report.drift.iter().find(|d| d.name == "fetch").unwrap();
        assert!(matches!(fetch.drift, Drift::IntegrityMismatch { .. }));
        let parse = report.drift.iter().find(|d| d.name == "parse").unwrap();
        assert_eq!(
            parse.drift,
            Drift::VersionChanged {
                locked: "0.3.0".to_string(),
                current: "0.4.0".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_removed_definition_is_missing() {
        let (registry, config) = project();
        let forge = forge(&registry, config);
        forge.lockfile().generate(false).await.unwrap();

        std::fs::remove_file(registry.project_root().join(".fractary/tools/fetch.yaml")).unwrap();
        forge.resolver().clear_cache();

        let report = forge.lockfile().verify().await.unwrap();

        assert_eq!(report.drift.len(), 1);
        assert_eq!(report.drift[0].name, "fetch");
        assert_eq!(report.drift[0].drift, Drift::Missing);
    }

    #[tokio::test]
    async fn test_shadowing_local_copy_changes_source() {
        let (registry, config) = project();
        let forge = forge(&registry, config);
        forge.lockfile().generate(false).await.unwrap();

        registry.write_local("agents", "writer", "yaml", &yaml::agent("writer", "1.0.0", ""));
        forge.resolver().clear_cache();

        let report = forge.lockfile().verify().await.unwrap();

        assert!(report.drift.iter().any(|d| d.name == "writer"
            && d.drift
                == Drift::SourceChanged {
                    locked: Source::Global,
                    current: Source::Local,
                }));
    }
}

mod update_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_update_refreshes_and_keeps_failed_entries() {
        let (registry, config) = project();
        let forge = forge(&registry, config);
        let generated = forge.lockfile().generate(false).await.unwrap();

        registry.write_local("tools", "parse", "yaml", &yaml::tool("parse", "0.5.0", ""));
        std::fs::remove_dir_all(registry.global_root().join("registry/agents")).unwrap();
        forge.resolver().clear_cache();

        let report = forge.lockfile().update().await.unwrap();

        assert_eq!(report.lockfile.tools["parse"].version, "0.5.0");
        assert_eq!(report.lockfile.agents["writer"], generated.lockfile.agents["writer"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].code, "AGENT_NOT_FOUND");
    }
}
