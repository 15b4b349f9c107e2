use std::fs;

use backlog_order::config::{ConfigError, EngineConfig};
use backlog_order::engine::{DropZones, KeySpacing, MovePlanner, TreeIndex};
use backlog_order::models::*;
use speculate2::speculate;
use tempfile::TempDir;

speculate! {
    before {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("backlog-order").join("config.json");
    }

    describe "save_to and load_from" {
        it "round-trips a tuned configuration" {
            let config = EngineConfig {
                drop: DropZones { edge_threshold: 0.4 },
                keys: KeySpacing {
                    base_gap: OrderKey::from_units(10),
                    ..KeySpacing::default()
                },
                ..EngineConfig::default()
            };
            config.save_to(&path).expect("Failed to save");

            let loaded = EngineConfig::load_from(&path).expect("Failed to load");
            assert_eq!(loaded, config);
        }

        it "fills in missing sections with defaults" {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, r#"{ "lattice": { "epic": ["task"] } }"#).unwrap();

            let loaded = EngineConfig::load_from(&path).expect("Failed to load");
            assert!(loaded.lattice.can_parent(WorkItemType::Epic, WorkItemType::Task));
            assert!(loaded.lattice.can_parent(WorkItemType::Story, WorkItemType::Task));
            assert_eq!(loaded.drop, DropZones::default());
            assert_eq!(loaded.keys, KeySpacing::default());
        }

        it "rejects a configuration that fails validation" {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, r#"{ "drop": { "edge_threshold": 0.9 } }"#).unwrap();

            let err = EngineConfig::load_from(&path).unwrap_err();
            assert_eq!(
                err.downcast_ref::<ConfigError>(),
                Some(&ConfigError::EdgeThreshold(0.9))
            );
        }

        it "reports malformed json" {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "{ not json").unwrap();

            let err = EngineConfig::load_from(&path).unwrap_err();
            assert!(format!("{:#}", err).contains("Failed to parse config file"));
        }

        it "reports a missing file" {
            assert!(EngineConfig::load_from(&path).is_err());
        }
    }

    describe "tuned planning" {
        it "appends with the configured gap" {
            let config = EngineConfig {
                keys: KeySpacing {
                    base_gap: OrderKey::from_units(10),
                    ..KeySpacing::default()
                },
                ..EngineConfig::default()
            };
            let epic = Node {
                id: NodeId::random(),
                kind: WorkItemType::Epic,
                parent_id: None,
                order: OrderKey::from_units(1000),
                title: "Billing".to_string(),
            };
            let tree = TreeIndex::build(vec![epic]);

            let key = MovePlanner::new(&config).end_of_list_key(&tree, None);
            assert_eq!(key, Ok(OrderKey::from_units(1010)));
        }
    }
}
