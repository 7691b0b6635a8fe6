//! Code verification and command dispatch
//!
//! For a wipe or update request on `udid`:
//! 1. Fetch the device record from the backend
//! 2. Take (and thereby burn) the code stored for `udid`
//! 3. Compare it to the record's proof extension attribute
//! 4. Build the command for that record and dispatch it
//!
//! The stored code is consumed as soon as the record has been fetched,
//! so a failed comparison cannot be retried with the same code.

use crate::error::ApiError;
use cmdod_auth::{CodeError, CodeStore};
use cmdod_core::Udid;
use cmdod_jamf::{
    Command, CommandError, Computer, DeviceBackend, EraseDevice, SoftwareUpdate,
    SoftwareUpdateConfig, ERASE_DEVICE_PASSCODE,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound on the backend work behind a single request
pub const VERIFY_DEADLINE: Duration = Duration::from_secs(10);

/// Privileged action requested by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Erase,
    SoftwareUpdate(SoftwareUpdateConfig),
}

impl Action {
    fn build(&self, computer: &Computer) -> Result<Command, CommandError> {
        match self {
            Action::Erase => EraseDevice::new(computer, ERASE_DEVICE_PASSCODE).map(Command::from),
            Action::SoftwareUpdate(config) => {
                SoftwareUpdate::new(computer, config.clone()).map(Command::from)
            }
        }
    }
}

/// Ties issued codes to the backend's view of a device
pub struct Verifier {
    codes: Arc<CodeStore>,
    backend: Arc<dyn DeviceBackend>,
    proof_attribute: String,
    deadline: Duration,
}

impl Verifier {
    pub fn new(
        codes: Arc<CodeStore>,
        backend: Arc<dyn DeviceBackend>,
        proof_attribute: impl Into<String>,
    ) -> Self {
        Self {
            codes,
            backend,
            proof_attribute: proof_attribute.into(),
            deadline: VERIFY_DEADLINE,
        }
    }

    /// Builder pattern: set the per-request deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn codes(&self) -> &Arc<CodeStore> {
        &self.codes
    }

    /// Verify the code for `udid` and send `action` to the device
    ///
    /// Returns the command that was dispatched.
    pub async fn execute(&self, udid: &Udid, action: Action) -> Result<Command, ApiError> {
        tokio::time::timeout(self.deadline, self.verify_and_dispatch(udid, action))
            .await
            .map_err(|_| ApiError::Timeout)?
    }

    async fn verify_and_dispatch(&self, udid: &Udid, action: Action) -> Result<Command, ApiError> {
        let computer = self.backend.fetch_device(udid).await?;

        let presented = computer.extension_attribute(&self.proof_attribute);
        let stored = self.codes.peek_and_consume(udid).await;

        let presented = presented.ok_or_else(|| {
            debug!(udid = %udid, attribute = %self.proof_attribute, "Proof attribute missing");
            CodeError::ProofAttributeNotFound(self.proof_attribute.clone())
        })?;
        let stored = stored?;

        if stored != presented {
            debug!(udid = %udid, attribute = %self.proof_attribute, "Code mismatch");
            return Err(CodeError::Mismatch.into());
        }

        let command = action.build(&computer)?;
        self.backend.dispatch(&command).await?;

        info!(
            udid = %udid,
            command = command.name(),
            device_id = command.device_id(),
            "Verified and dispatched command"
        );
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cmdod_core::Classify;
    use cmdod_jamf::{ExtensionAttribute, General, JamfError, JamfResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const ATTRIBUTE: &str = "Wipe Code";

    #[derive(Default)]
    struct FakeBackend {
        records: Mutex<HashMap<Udid, Computer>>,
        fetches: AtomicUsize,
        sent: Mutex<Vec<Command>>,
        fetch_delay: Option<Duration>,
    }

    impl FakeBackend {
        fn set_proof(&self, udid: &Udid, value: Option<&str>) {
            let extension_attributes = value
                .map(|v| {
                    vec![ExtensionAttribute {
                        name: ATTRIBUTE.to_string(),
                        value: v.to_string(),
                    }]
                })
                .unwrap_or_default();
            self.records.lock().unwrap().insert(
                *udid,
                Computer {
                    general: General {
                        id: 42,
                        udid: udid.to_string(),
                        name: "Studio-Mac".to_string(),
                        serial_number: "C02XYZ".to_string(),
                    },
                    extension_attributes,
                },
            );
        }

        fn sent(&self) -> Vec<Command> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeviceBackend for FakeBackend {
        async fn fetch_device(&self, udid: &Udid) -> JamfResult<Computer> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.fetch_delay {
                tokio::time::sleep(delay).await;
            }
            self.records
                .lock()
                .unwrap()
                .get(udid)
                .cloned()
                .ok_or(JamfError::NotFound)
        }

        async fn dispatch(&self, command: &Command) -> JamfResult<()> {
            self.sent.lock().unwrap().push(command.clone());
            Ok(())
        }
    }

    fn setup(backend: FakeBackend) -> (Verifier, Arc<FakeBackend>, Arc<CodeStore>) {
        let backend = Arc::new(backend);
        let codes = Arc::new(CodeStore::new());
        let verifier = Verifier::new(codes.clone(), backend.clone(), ATTRIBUTE);
        (verifier, backend, codes)
    }

    fn udid() -> Udid {
        Udid::parse("5E6C8F2A-1B3D-4C5E-9F70-A1B2C3D4E5F6").unwrap()
    }

    #[tokio::test]
    async fn test_matching_code_dispatches_erase() {
        let (verifier, backend, codes) = setup(FakeBackend::default());
        let code = codes.issue(&udid()).await.unwrap();
        backend.set_proof(&udid(), Some(code.value()));

        let command = verifier.execute(&udid(), Action::Erase).await.unwrap();
        assert_eq!(command.name(), "EraseDevice");
        assert_eq!(command.device_id(), 42);
        assert_eq!(backend.sent(), vec![command]);
        assert!(!codes.contains(&udid()).await);
    }

    #[tokio::test]
    async fn test_mismatch_burns_the_code() {
        let (verifier, backend, codes) = setup(FakeBackend::default());
        let code = codes.issue(&udid()).await.unwrap();
        backend.set_proof(&udid(), Some("not-the-code"));

        let err = verifier.execute(&udid(), Action::Erase).await.unwrap_err();
        assert!(matches!(err, ApiError::Code(CodeError::Mismatch)));
        assert_eq!(err.status(), 400);

        // The right value no longer helps: the code is gone
        backend.set_proof(&udid(), Some(code.value()));
        let err = verifier.execute(&udid(), Action::Erase).await.unwrap_err();
        assert!(matches!(err, ApiError::Code(CodeError::NotFound)));
        assert!(backend.sent().is_empty());
    }

    #[tokio::test]
    async fn test_no_issued_code() {
        let (verifier, backend, _codes) = setup(FakeBackend::default());
        backend.set_proof(&udid(), Some("anything"));

        let err = verifier
            .execute(&udid(), Action::SoftwareUpdate(SoftwareUpdateConfig::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Code(CodeError::NotFound)));
        assert_eq!(err.status(), 401);
        assert!(backend.sent().is_empty());
    }

    #[tokio::test]
    async fn test_missing_attribute_still_consumes() {
        let (verifier, backend, codes) = setup(FakeBackend::default());
        codes.issue(&udid()).await.unwrap();
        backend.set_proof(&udid(), None);

        let err = verifier.execute(&udid(), Action::Erase).await.unwrap_err();
        assert!(matches!(err, ApiError::Code(CodeError::ProofAttributeNotFound(_))));
        assert!(!codes.contains(&udid()).await);
        assert!(codes.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_code() {
        let (verifier, backend, codes) = setup(FakeBackend::default());
        let code = codes.issue(&udid()).await.unwrap();
        backend.set_proof(&udid(), Some(code.value()));

        tokio::time::advance(Duration::from_secs(121)).await;

        let err = verifier.execute(&udid(), Action::Erase).await.unwrap_err();
        assert!(matches!(err, ApiError::Code(CodeError::Expired)));
        assert_eq!(err.status(), 410);
        assert!(backend.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_device_leaves_code_alone() {
        let (verifier, backend, codes) = setup(FakeBackend::default());
        codes.issue(&udid()).await.unwrap();

        let err = verifier.execute(&udid(), Action::Erase).await.unwrap_err();
        assert!(matches!(err, ApiError::Jamf(JamfError::NotFound)));
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);
        assert!(codes.contains(&udid()).await);
    }

    #[tokio::test]
    async fn test_software_update_uses_given_config() {
        let (verifier, backend, codes) = setup(FakeBackend::default());
        let code = codes.issue(&udid()).await.unwrap();
        backend.set_proof(&udid(), Some(code.value()));

        let config = cmdod_jamf::SoftwareUpdateRequest {
            target_version: Some("14.5".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap();

        let command = verifier
            .execute(&udid(), Action::SoftwareUpdate(config))
            .await
            .unwrap();
        match command {
            Command::SoftwareUpdate(update) => {
                assert_eq!(update.config().target_version(), Some("14.5"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        let (verifier, backend, codes) = setup(FakeBackend {
            fetch_delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let verifier = verifier.with_deadline(Duration::from_secs(1));
        codes.issue(&udid()).await.unwrap();
        backend.set_proof(&udid(), Some("x"));

        let err = verifier.execute(&udid(), Action::Erase).await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout));
        assert_eq!(err.status(), 500);
        assert!(codes.contains(&udid()).await);
    }
}
