//! Background loop for time-driven tree work.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use vds_types::TreeId;

use crate::config::SequencerConfig;
use crate::error::ServiceResult;
use crate::service::TreeService;

/// What one sequencer pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequencerPass {
    /// Trees that received an idle root.
    pub idle_roots: Vec<TreeId>,
    /// Trees permanently removed after their retention window.
    pub reaped: Vec<TreeId>,
}

/// Periodically issues idle roots and reaps expired trees.
pub struct Sequencer {
    service: Arc<TreeService>,
    interval: Duration,
}

impl Sequencer {
    pub fn new(service: Arc<TreeService>, config: &SequencerConfig) -> Self {
        Self {
            service,
            interval: config.interval(),
        }
    }

    /// Run a single pass on the calling thread.
    pub fn run_once(&self) -> ServiceResult<SequencerPass> {
        run_pass(&self.service)
    }

    /// Run passes until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Passes take locks and call signers, so each one runs on the blocking
    /// pool. A pass in progress finishes before shutdown is observed.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let service = Arc::clone(&self.service);
                    match tokio::task::spawn_blocking(move || run_pass(&service)).await {
                        Ok(Ok(pass)) if pass != SequencerPass::default() => {
                            tracing::info!(
                                idle_roots = pass.idle_roots.len(),
                                reaped = pass.reaped.len(),
                                "sequencer pass"
                            );
                        }
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => tracing::error!(error = %e, "sequencer pass failed"),
                        Err(e) => tracing::error!(error = %e, "sequencer pass aborted"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("sequencer shutting down");
                        break;
                    }
                }
            }
        }
    }
}

fn run_pass(service: &TreeService) -> ServiceResult<SequencerPass> {
    let reaped = service.reap_expired()?;
    let idle_roots = service.sequence_idle()?;
    Ok(SequencerPass { idle_roots, reaped })
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use vds_crypto::{
        CryptoError, Ed25519SignerFactory, RootSigner, SignerError, SignerFactory, SigningKey,
    };
    use vds_types::{
        AnyPayload, DigitallySigned, HashStrategy, ManualClock, SignatureCipherSuite, Timestamp,
        Tree, TreeSpec, TreeType,
    };

    use super::*;
    use crate::config::ServiceConfig;

    fn setup(clock: Arc<ManualClock>) -> (Arc<TreeService>, TreeId) {
        setup_with(clock, Arc::new(Ed25519SignerFactory))
    }

    fn setup_with(
        clock: Arc<ManualClock>,
        signers: Arc<dyn SignerFactory>,
    ) -> (Arc<TreeService>, TreeId) {
        let config = ServiceConfig {
            retention_window_secs: 60,
            ..Default::default()
        };
        let service = Arc::new(TreeService::in_memory_with_signers(&config, clock, signers));
        let key = SigningKey::generate();
        let tree = service
            .create_tree(TreeSpec {
                tree_type: Some(TreeType::Log),
                hash_strategy: Some(HashStrategy::Rfc6962Sha256),
                signature_cipher_suite: Some(SignatureCipherSuite::Ed25519),
                public_key: Some(key.verifying_key().as_bytes().to_vec()),
                private_key: Some(key.to_payload()),
                max_root_duration: Duration::from_secs(30),
                ..Default::default()
            })
            .unwrap();
        (service, tree.tree_id)
    }

    #[test]
    fn run_once_issues_idle_roots_and_reaps() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_nanos(1_000_000_000)));
        let (service, tree_id) = setup(clock.clone());
        let sequencer = Sequencer::new(service.clone(), &SequencerConfig::default());

        assert_eq!(sequencer.run_once().unwrap(), SequencerPass::default());

        clock.advance(Duration::from_secs(30));
        let pass = sequencer.run_once().unwrap();
        assert_eq!(pass.idle_roots, vec![tree_id]);

        service.soft_delete_tree(tree_id).unwrap();
        clock.advance(Duration::from_secs(60));
        let pass = sequencer.run_once().unwrap();
        assert_eq!(pass.reaped, vec![tree_id]);
        assert!(pass.idle_roots.is_empty());
    }

    #[tokio::test]
    async fn background_loop_commits_and_stops() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_nanos(1_000_000_000)));
        let (service, tree_id) = setup(clock.clone());
        clock.advance(Duration::from_secs(30));

        let sequencer = Sequencer::new(
            service.clone(),
            &SequencerConfig {
                enabled: true,
                interval_ms: 10,
            },
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { sequencer.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        let root = service.latest_log_root(tree_id).unwrap();
        assert_eq!(root.tree_revision, 1);

        shutdown_tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "sequencer should stop on shutdown");
    }

    #[tokio::test]
    async fn dropped_sender_stops_loop() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_nanos(1)));
        let (service, _) = setup(clock);
        let sequencer = Sequencer::new(service, &SequencerConfig::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { sequencer.run(shutdown_rx).await });
        drop(shutdown_tx);
        assert!(tokio::time::timeout(Duration::from_secs(1), handle).await.is_ok());
    }

    /// Ed25519 signing behind a slow remote call.
    struct SlowSigners;

    struct SlowSigner(Arc<dyn RootSigner>);

    impl RootSigner for SlowSigner {
        fn cipher_suite(&self) -> SignatureCipherSuite {
            self.0.cipher_suite()
        }

        fn sign(&self, message: &[u8]) -> Result<DigitallySigned, SignerError> {
            std::thread::sleep(Duration::from_millis(500));
            self.0.sign(message)
        }
    }

    impl SignerFactory for SlowSigners {
        fn signer_for(
            &self,
            tree: &Tree,
            private_key: &AnyPayload,
        ) -> Result<Arc<dyn RootSigner>, CryptoError> {
            let inner = Ed25519SignerFactory.signer_for(tree, private_key)?;
            Ok(Arc::new(SlowSigner(inner)))
        }
    }

    #[tokio::test]
    async fn slow_signer_does_not_stall_the_runtime() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_nanos(1_000_000_000)));
        let (service, tree_id) = setup_with(clock.clone(), Arc::new(SlowSigners));
        clock.advance(Duration::from_secs(30));

        let sequencer = Sequencer::new(service.clone(), &SequencerConfig::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { sequencer.run(shutdown_rx).await });

        let start = Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(start.elapsed() < Duration::from_millis(400));

        shutdown_tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(result.is_ok(), "sequencer should stop after the pass");
        assert_eq!(service.latest_log_root(tree_id).unwrap().tree_revision, 1);
    }
}
