//! Broadcast & Confirmation Tracker
//!
//! A broadcast hash only means the mempool accepted the tx. The tracker waits
//! at least one block interval, then looks the tx up by hash, polling a
//! bounded number of times.

use super::client::ChainClient;
use crate::error::{with_timeout, ArbError, ArbResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Not indexed (yet)
    NotFound,
    Committed { height: u64, gas_used: u64 },
    /// Included in a block with a non-zero result code; fees and the sequence are spent
    Reverted {
        height: u64,
        code: u32,
        raw_log: String,
    },
}

impl TxStatus {
    /// `Reverted` as a `CommittedButReverted` error, everything else unchanged
    pub fn into_result(self, hash: &str) -> ArbResult<TxStatus> {
        match self {
            TxStatus::Reverted { code, raw_log, .. } => Err(ArbError::CommittedButReverted {
                hash: hash.to_string(),
                code,
                raw_log,
            }),
            other => Ok(other),
        }
    }
}

pub struct ConfirmationTracker {
    chain: Arc<dyn ChainClient>,
    delay: Duration,
    max_polls: u32,
    call_timeout: Duration,
}

impl ConfirmationTracker {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        delay: Duration,
        max_polls: u32,
        call_timeout: Duration,
    ) -> Self {
        Self {
            chain,
            delay,
            max_polls: max_polls.max(1),
            call_timeout,
        }
    }

    /// Single lookup by hash
    pub async fn status(&self, hash: &str) -> ArbResult<TxStatus> {
        let result = with_timeout("tx lookup", self.call_timeout, self.chain.get_tx(hash)).await?;
        Ok(match result {
            None => TxStatus::NotFound,
            Some(tx) if tx.code == 0 => TxStatus::Committed {
                height: tx.height,
                gas_used: tx.gas_used,
            },
            Some(tx) => TxStatus::Reverted {
                height: tx.height,
                code: tx.code,
                raw_log: tx.raw_log,
            },
        })
    }

    /// Sleep, look up, repeat until the tx is found or the poll bound is hit.
    /// Transient lookup failures count as a poll and do not end the wait.
    pub async fn wait(&self, hash: &str) -> ArbResult<TxStatus> {
        for poll in 1..=self.max_polls {
            tokio::time::sleep(self.delay).await;
            match self.status(hash).await {
                Ok(TxStatus::NotFound) => {
                    debug!("Tx {} not found (poll {}/{})", hash, poll, self.max_polls);
                }
                Ok(TxStatus::Committed { height, gas_used }) => {
                    info!("✅ Tx {} committed at height {} (gas used {})", hash, height, gas_used);
                    return Ok(TxStatus::Committed { height, gas_used });
                }
                Ok(TxStatus::Reverted {
                    height,
                    code,
                    raw_log,
                }) => {
                    error!(
                        "❌ Tx {} reverted at height {} (code {}): {}",
                        hash, height, code, raw_log
                    );
                    return Ok(TxStatus::Reverted {
                        height,
                        code,
                        raw_log,
                    });
                }
                Err(e) if e.is_transient() => {
                    warn!("Tx {} lookup failed (poll {}/{}): {}", hash, poll, self.max_polls, e);
                }
                Err(e) => return Err(e),
            }
        }
        warn!("Tx {} still not found after {} polls", hash, self.max_polls);
        Ok(TxStatus::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::client::{AccountState, TxResult};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers tx lookups from a script, then keeps returning not-found
    struct Scripted {
        answers: Mutex<VecDeque<ArbResult<Option<TxResult>>>>,
        lookups: Mutex<u32>,
    }

    impl Scripted {
        fn new(answers: Vec<ArbResult<Option<TxResult>>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                lookups: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl ChainClient for Scripted {
        async fn account(&self, _: &str) -> ArbResult<AccountState> {
            unreachable!()
        }
        async fn balance(&self, _: &str, _: &str) -> ArbResult<u128> {
            unreachable!()
        }
        async fn latest_height(&self) -> ArbResult<u64> {
            unreachable!()
        }
        async fn broadcast(&self, _: &[u8]) -> ArbResult<String> {
            unreachable!()
        }
        async fn get_tx(&self, _: &str) -> ArbResult<Option<TxResult>> {
            *self.lookups.lock().unwrap() += 1;
            self.answers.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }
    }

    fn tracker(chain: Arc<Scripted>, max_polls: u32) -> ConfirmationTracker {
        ConfirmationTracker::new(
            chain,
            Duration::from_millis(1),
            max_polls,
            Duration::from_secs(1),
        )
    }

    fn found(code: u32, raw_log: &str) -> ArbResult<Option<TxResult>> {
        Ok(Some(TxResult {
            height: 500,
            code,
            raw_log: raw_log.to_string(),
            gas_used: 900_000,
        }))
    }

    #[tokio::test]
    async fn test_committed_after_not_found() {
        let chain = Scripted::new(vec![Ok(None), found(0, "")]);
        let status = tracker(chain.clone(), 3).wait("AB").await.unwrap();
        assert_eq!(
            status,
            TxStatus::Committed {
                height: 500,
                gas_used: 900_000
            }
        );
        assert_eq!(*chain.lookups.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reverted_surfaces_raw_log() {
        let chain = Scripted::new(vec![found(6, "token amount calculated is lesser than min amount")]);
        let status = tracker(chain, 3).wait("AB").await.unwrap();
        let err = status.into_result("AB").unwrap_err();
        match err {
            ArbError::CommittedButReverted { hash, code, raw_log } => {
                assert_eq!(hash, "AB");
                assert_eq!(code, 6);
                assert!(raw_log.contains("lesser than min amount"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_bound() {
        let chain = Scripted::new(vec![]);
        let status = tracker(chain.clone(), 2).wait("AB").await.unwrap();
        assert_eq!(status, TxStatus::NotFound);
        assert_eq!(*chain.lookups.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_transient_lookup_failure_keeps_polling() {
        let chain = Scripted::new(vec![
            Err(ArbError::HttpStatus {
                context: "tx lookup",
                status: 502,
                body: String::new(),
            }),
            found(0, ""),
        ]);
        let status = tracker(chain, 3).wait("AB").await.unwrap();
        assert!(matches!(status, TxStatus::Committed { .. }));
    }

    #[tokio::test]
    async fn test_fatal_lookup_failure_ends_wait() {
        let chain = Scripted::new(vec![Err(ArbError::Signing("x".to_string()))]);
        assert!(tracker(chain, 3).wait("AB").await.is_err());
    }
}
