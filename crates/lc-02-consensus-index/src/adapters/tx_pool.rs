use crate::ports::TransactionPool;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::Transaction;
use tracing::debug;

/// Pending transactions kept in memory, in arrival order.
#[derive(Debug, Default)]
pub struct InMemoryTransactionPool {
    pending: RwLock<Vec<Transaction>>,
}

impl InMemoryTransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, tx: Transaction) {
        self.pending.write().push(tx);
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.pending.read().clone()
    }
}

#[async_trait]
impl TransactionPool for InMemoryTransactionPool {
    async fn remove_included(&self, hashes: Vec<String>) -> Result<(), String> {
        self.pending.write().retain(|tx| !hashes.contains(&tx.hash()));
        Ok(())
    }

    async fn readmit(&self, transactions: Vec<Transaction>) -> Result<(), String> {
        let mut pending = self.pending.write();
        for tx in transactions {
            let hash = tx.hash();
            if !pending.iter().any(|p| p.hash() == hash) {
                debug!("[lc-02] Readmitting transaction {}", hash);
                pending.push(tx);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(comment: &str) -> Transaction {
        Transaction {
            version: 10,
            currency: "g1".to_string(),
            blockstamp: "0-00AA".to_string(),
            comment: comment.to_string(),
            ..Transaction::default()
        }
    }

    #[tokio::test]
    async fn test_remove_then_readmit() {
        let pool = InMemoryTransactionPool::new();
        pool.add(tx("a"));
        pool.add(tx("b"));

        pool.remove_included(vec![tx("a").hash()]).await.unwrap();
        assert_eq!(pool.pending().len(), 1);

        pool.readmit(vec![tx("a"), tx("b")]).await.unwrap();
        let comments: Vec<String> = pool.pending().into_iter().map(|t| t.comment).collect();
        assert_eq!(comments, vec!["b", "a"]);
    }
}
