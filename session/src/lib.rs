//! Session value object and the SessionManager that owns its lifecycle
//! (creation, persistence, deletion) against a SandboxFS working root and a
//! MetaStore (§4.4, §4.5).

pub mod manager;
pub mod record;
pub mod session;
pub mod templates;

pub use manager::SessionManager;
pub use record::Compiler;
pub use record::ConvertFormat;
pub use record::ConvertSpec;
pub use record::Status;
pub use record::validate_conversion_data;
pub use session::PublicView;
pub use session::Session;
pub use templates::TemplateRecord;
pub use templates::template_file_name;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use latex_clock::Clock;
    use latex_clock::TestClock;
    use latex_common::ServiceError;
    use latex_sandboxfs::SandboxFs;
    use latex_store::InMemoryMetaStore;
    use latex_store::MetaStore;
    use tempfile::TempDir;

    use super::*;

    fn manager(clock: Arc<TestClock>, ttl: u64) -> (TempDir, SessionManager) {
        let dir = TempDir::new().expect("tempdir");
        let root = SandboxFs::new(dir.path()).expect("sandbox");
        let store: Arc<dyn MetaStore> = Arc::new(InMemoryMetaStore::new());
        let clock: Arc<dyn Clock> = clock;
        let manager = SessionManager::new(root, store, clock, "instance-under-test", ttl);
        (dir, manager)
    }

    #[tokio::test]
    async fn create_then_load_round_trips_metadata() {
        let clock = Arc::new(TestClock::new(1_000.0));
        let (_dir, manager) = manager(clock, 300);

        let created = manager
            .create_session("xelatex", "main.tex".into(), None)
            .await
            .expect("create");
        assert_eq!(created.status(), Status::Editable);
        assert_eq!(created.record().created, 1_000.0);
        assert_eq!(created.record().expires_at, 1_300.0);

        let loaded = manager
            .load_session(created.key())
            .await
            .expect("load")
            .expect("present");
        assert_eq!(loaded.compiler(), created.compiler());
        assert_eq!(loaded.target(), created.target());
        assert_eq!(loaded.status(), created.status());
        assert_eq!(loaded.record().created, created.record().created);
        assert_eq!(loaded.record().expires_at, created.record().expires_at);
    }

    #[tokio::test]
    async fn delete_session_removes_every_trace() {
        let clock = Arc::new(TestClock::new(0.0));
        let (_dir, manager) = manager(clock, 300);

        let session = manager
            .create_session("pdflatex", "main.tex".into(), None)
            .await
            .expect("create");
        let key = session.key().to_string();

        manager.delete_session(&key).await.expect("delete");

        assert!(manager.load_session(&key).await.expect("load").is_none());
        let members = manager.get_all_session_ids().await.expect("members");
        assert!(!members.contains(&key));
        assert!(!session.source_files().root_path().exists());
    }

    #[tokio::test]
    async fn state_machine_only_allows_the_documented_transitions() {
        let clock = Arc::new(TestClock::new(0.0));
        let (_dir, manager) = manager(clock, 300);
        let mut session = manager
            .create_session("xelatex", "main.tex".into(), None)
            .await
            .expect("create");

        assert!(matches!(
            manager
                .complete_session(&mut session, "p".into(), "l".into())
                .await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            manager.error_session(&mut session, "l".into()).await,
            Err(ServiceError::InvalidState(_))
        ));

        manager.finalize_session(&mut session).await.expect("finalize");
        assert_eq!(session.status(), Status::Finalized);
        assert!(matches!(
            manager.finalize_session(&mut session).await,
            Err(ServiceError::InvalidState(_))
        ));

        manager
            .complete_session(&mut session, "/abs/product.pdf".into(), "/abs/log".into())
            .await
            .expect("complete");
        assert_eq!(session.status(), Status::Success);
        assert!(matches!(
            manager.error_session(&mut session, "l".into()).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn unsupported_compiler_is_rejected() {
        let clock = Arc::new(TestClock::new(0.0));
        let (_dir, manager) = manager(clock, 300);
        let err = manager
            .create_session("luaenlightenedtex", "main.tex".into(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }
}
