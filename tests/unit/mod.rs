// Test code is allowed to panic on failure
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

//! Unit tests for nexus-operator.
//!
//! These tests run without a Kubernetes cluster and test individual
//! components in isolation.

mod crd_tests {
    use nexus_operator::crd::{Condition, ExposeType, Nexus, NexusPhase, NexusSpec, NexusStatus};

    #[test]
    fn test_phase_display() {
        assert_eq!(NexusPhase::Pending.to_string(), "Pending");
        assert_eq!(NexusPhase::Ok.to_string(), "OK");
        assert_eq!(NexusPhase::Failure.to_string(), "Failure");
        assert_eq!(NexusPhase::Updating.to_string(), "Updating");
    }

    #[test]
    fn test_phase_default() {
        assert_eq!(NexusPhase::default(), NexusPhase::Pending);
    }

    #[test]
    fn test_phase_serialized_like_display() {
        for phase in NexusPhase::ALL {
            assert_eq!(
                serde_json::to_value(phase).unwrap(),
                serde_json::Value::String(phase.to_string())
            );
        }
    }

    #[test]
    fn test_expose_type_display() {
        assert_eq!(ExposeType::Route.to_string(), "Route");
        assert_eq!(ExposeType::Ingress.to_string(), "Ingress");
        assert_eq!(ExposeType::NodePort.to_string(), "NodePort");
    }

    #[test]
    fn test_spec_from_manifest() {
        let spec: NexusSpec = serde_json::from_value(serde_json::json!({
            "replicas": 0,
            "useRedHatImage": true,
            "automaticUpdate": { "minorVersion": 28 },
            "persistence": { "persistent": true, "storageClass": "fast" },
            "networking": { "expose": true, "exposeAs": "NodePort", "nodePort": 31031 },
            "serverOperations": { "disableRepositoryCreation": true }
        }))
        .unwrap();

        assert_eq!(spec.replicas, 0);
        assert!(spec.use_red_hat_image);
        assert!(!spec.automatic_update.disabled);
        assert_eq!(spec.automatic_update.minor_version, Some(28));
        assert_eq!(spec.persistence.volume_size, "10Gi");
        assert_eq!(spec.persistence.storage_class.as_deref(), Some("fast"));
        assert_eq!(spec.networking.expose_as, Some(ExposeType::NodePort));
        assert_eq!(spec.networking.node_port, Some(31031));
        assert!(!spec.server_operations.disable_operator_user_creation);
        assert!(spec.server_operations.disable_repository_creation);
    }

    #[test]
    fn test_status_field_names() {
        let status = NexusStatus {
            nexus_status: NexusPhase::Ok,
            nexus_route: Some("http://nexus.example.com".to_string()),
            update_conditions: vec!["Successfully updated from 3.25.0 to 3.25.1".to_string()],
            ..Default::default()
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["nexusStatus"], "OK");
        assert_eq!(value["nexusRoute"], "http://nexus.example.com");
        assert_eq!(value["updateConditions"][0], "Successfully updated from 3.25.0 to 3.25.1");
        assert_eq!(value["serverOperationsStatus"]["operatorUserCreated"], false);
    }

    #[test]
    fn test_service_account_defaults_to_name() {
        let mut nexus = Nexus::new("nexus3", NexusSpec::default());
        assert_eq!(nexus.service_account_name(), "nexus3");

        nexus.spec.service_account_name = Some("custom".to_string());
        assert_eq!(nexus.service_account_name(), "custom");
    }

    #[test]
    fn test_update_conditions_empty_without_status() {
        let nexus = Nexus::new("nexus3", NexusSpec::default());
        assert!(nexus.update_conditions().is_empty());
    }

    #[test]
    fn test_condition_ready() {
        let condition = Condition::ready(true, "Available", "Nexus is available", Some(1));
        assert_eq!(condition.r#type, "Ready");
        assert_eq!(condition.status, "True");
        assert_eq!(condition.reason, "Available");
        assert_eq!(condition.message, "Nexus is available");
        assert_eq!(condition.observed_generation, Some(1));
    }

    #[test]
    fn test_condition_not_ready() {
        let condition = Condition::ready(false, "Pending", "Waiting for Nexus", None);
        assert_eq!(condition.status, "False");
    }

    #[test]
    fn test_condition_progressing() {
        let condition = Condition::progressing(true, "Applying", "Updating resources", Some(2));
        assert_eq!(condition.r#type, "Progressing");
        assert_eq!(condition.status, "True");
    }

    #[test]
    fn test_condition_degraded() {
        let condition = Condition::degraded(true, "ReconcileFailed", "Apply failed", Some(3));
        assert_eq!(condition.r#type, "Degraded");
        assert_eq!(condition.status, "True");
    }

    #[test]
    fn test_condition_same_state_ignores_time() {
        let a = Condition::ready(true, "Available", "ok", Some(1));
        let mut b = a.clone();
        b.last_transition_time = "2020-01-01T00:00:00Z".to_string();
        assert!(a.same_state(&b));

        b.status = "False".to_string();
        assert!(!a.same_state(&b));
    }
}

mod update_state_tests {
    use nexus_operator::controller::update_state::UpdateState;

    fn updating() -> UpdateState {
        UpdateState::Updating {
            previous: "3.25.0".to_string(),
            target: "3.25.1".to_string(),
        }
    }

    #[test]
    fn test_log_entry_formats() {
        assert_eq!(
            updating().to_string(),
            "Starting automatic update from 3.25.0 to 3.25.1"
        );
        let succeeded = UpdateState::Succeeded {
            previous: "3.25.0".to_string(),
            target: "3.25.1".to_string(),
        };
        assert_eq!(
            succeeded.to_string(),
            "Successfully updated from 3.25.0 to 3.25.1"
        );
        let failed = UpdateState::Failed {
            previous: "3.25.0".to_string(),
            target: "3.25.1".to_string(),
        };
        assert_eq!(failed.to_string(), "Failed to update from 3.25.0 to 3.25.1");
    }

    #[test]
    fn test_empty_log_is_idle() {
        assert_eq!(UpdateState::from_log(&[]).unwrap(), UpdateState::Idle);
        assert_eq!(UpdateState::Idle.entry(), None);
    }

    #[test]
    fn test_only_last_entry_counts() {
        let log = vec![
            "Starting automatic update from 3.25.0 to 3.25.1".to_string(),
            "Successfully updated from 3.25.0 to 3.25.1".to_string(),
        ];
        let state = UpdateState::from_log(&log).unwrap();
        assert!(!state.is_updating());
        assert!(matches!(state, UpdateState::Succeeded { .. }));
    }

    #[test]
    fn test_entry_parses_back() {
        let entry = updating().entry().unwrap();
        assert_eq!(UpdateState::parse_entry(&entry).unwrap(), updating());
        assert!(updating().is_updating());
    }

    #[test]
    fn test_unknown_entries_rejected() {
        assert!(UpdateState::parse_entry("Update in progress").is_err());
        assert!(UpdateState::parse_entry("Starting automatic update from 3.25.0").is_err());
        assert!(UpdateState::parse_entry("Starting automatic update from  to 3.25.1").is_err());
    }
}

mod version_tests {
    use nexus_operator::version::{
        VersionError, VersionTag, higher_version, image_version, split_image, with_tag,
    };

    #[test]
    fn test_parse_dotted_triple() {
        let version = VersionTag::parse("3.28.1").unwrap();
        assert_eq!((version.major, version.minor, version.micro), (Some(3), 28, 1));
        assert_eq!(version.to_string(), "3.28.1");
    }

    #[test]
    fn test_irregular_tag() {
        let version: VersionTag = "3.9.0-01".parse().unwrap();
        assert_eq!((version.minor, version.micro), (9, 1));
        assert!(higher_version("3.9.0-01", "3.9.0").unwrap());
    }

    #[test]
    fn test_major_ignored() {
        assert!(!higher_version("4.25.0", "3.25.0").unwrap());
        assert!(higher_version("2.26.0", "3.25.9").unwrap());
    }

    #[test]
    fn test_split_image() {
        assert_eq!(
            split_image("docker.io/sonatype/nexus3:3.28.1"),
            ("docker.io/sonatype/nexus3", Some("3.28.1"))
        );
        assert_eq!(
            split_image("docker.io/sonatype/nexus3"),
            ("docker.io/sonatype/nexus3", None)
        );
        assert_eq!(
            split_image("registry.local:5000/nexus3"),
            ("registry.local:5000/nexus3", None)
        );
        assert_eq!(
            split_image("registry.local:5000/nexus3:3.28.1"),
            ("registry.local:5000/nexus3", Some("3.28.1"))
        );
    }

    #[test]
    fn test_with_tag() {
        assert_eq!(
            with_tag("docker.io/sonatype/nexus3", "3.28.1"),
            "docker.io/sonatype/nexus3:3.28.1"
        );
        assert_eq!(
            with_tag("docker.io/sonatype/nexus3:3.27.0", "3.28.1"),
            "docker.io/sonatype/nexus3:3.28.1"
        );
    }

    #[test]
    fn test_image_version() {
        assert_eq!(
            image_version("docker.io/sonatype/nexus3:3.28.1").unwrap().minor,
            28
        );
        assert_eq!(
            image_version("docker.io/sonatype/nexus3"),
            Err(VersionError::MissingTag("docker.io/sonatype/nexus3".to_string()))
        );
        assert!(matches!(
            image_version("docker.io/sonatype/nexus3:latest"),
            Err(VersionError::Malformed(_))
        ));
    }
}

mod defaults_tests {
    use nexus_operator::capabilities::Capabilities;
    use nexus_operator::controller::defaults::{apply_defaults, validate};
    use nexus_operator::crd::{ExposeType, NEXUS_CERTIFIED_IMAGE, NEXUS_COMMUNITY_IMAGE, NexusSpec};

    fn kubernetes() -> Capabilities {
        Capabilities {
            route_available: false,
            ingress_available: true,
            openshift: false,
        }
    }

    fn openshift() -> Capabilities {
        Capabilities {
            route_available: true,
            ingress_available: true,
            openshift: true,
        }
    }

    #[test]
    fn test_image_defaults() {
        let mut spec = NexusSpec::default();
        apply_defaults("nexus3", &mut spec, &kubernetes());
        assert_eq!(spec.image, NEXUS_COMMUNITY_IMAGE);

        let mut spec = NexusSpec {
            use_red_hat_image: true,
            ..Default::default()
        };
        apply_defaults("nexus3", &mut spec, &kubernetes());
        assert_eq!(spec.image, NEXUS_CERTIFIED_IMAGE);
    }

    #[test]
    fn test_expose_as_follows_platform() {
        let mut spec = NexusSpec::default();
        spec.networking.expose = true;
        apply_defaults("nexus3", &mut spec, &openshift());
        assert_eq!(spec.networking.expose_as, Some(ExposeType::Route));

        let mut spec = NexusSpec::default();
        spec.networking.expose = true;
        apply_defaults("nexus3", &mut spec, &kubernetes());
        assert_eq!(spec.networking.expose_as, Some(ExposeType::Ingress));
    }

    #[test]
    fn test_invalid_pull_policy_dropped() {
        let mut spec = NexusSpec {
            image_pull_policy: Some("Sometimes".to_string()),
            ..Default::default()
        };
        apply_defaults("nexus3", &mut spec, &kubernetes());
        assert_eq!(spec.image_pull_policy, None);
    }

    #[test]
    fn test_random_admin_password_disables_server_operations() {
        let mut spec = NexusSpec {
            generate_random_admin_password: true,
            ..Default::default()
        };
        apply_defaults("nexus3", &mut spec, &kubernetes());
        assert!(spec.server_operations.disable_operator_user_creation);
    }

    #[test]
    fn test_defaults_are_stable() {
        let mut once = NexusSpec::default();
        apply_defaults("nexus3", &mut once, &kubernetes());
        let mut twice = once.clone();
        apply_defaults("nexus3", &mut twice, &kubernetes());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_validation() {
        let mut spec = NexusSpec::default();
        assert!(validate(&spec, &kubernetes()).is_ok());

        spec.replicas = 0;
        assert!(validate(&spec, &kubernetes()).is_ok());

        spec.replicas = -1;
        assert!(validate(&spec, &kubernetes()).is_err());

        spec.replicas = 1;
        spec.networking.expose = true;
        spec.networking.expose_as = Some(ExposeType::Ingress);
        assert!(validate(&spec, &kubernetes()).is_err());

        spec.networking.host = Some("nexus.example.com".to_string());
        assert!(validate(&spec, &kubernetes()).is_ok());

        spec.networking.expose_as = Some(ExposeType::Route);
        assert!(validate(&spec, &kubernetes()).is_err());
        assert!(validate(&spec, &openshift()).is_ok());

        spec.networking.expose_as = Some(ExposeType::NodePort);
        assert!(validate(&spec, &kubernetes()).is_err());
        spec.networking.node_port = Some(31031);
        assert!(validate(&spec, &kubernetes()).is_ok());
    }
}

mod error_tests {
    use std::time::Duration;

    use nexus_operator::controller::error::Error;

    #[test]
    fn test_validation_errors_are_not_retryable() {
        let error = Error::Validation("replicas 2 exceeds maximum 1".to_string());
        assert!(!error.is_retryable());
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_capability_errors_are_retryable() {
        let error = Error::Capability("discovery unavailable".to_string());
        assert!(error.is_retryable());
        assert!(error.requeue_after() > Duration::ZERO);
    }
}
