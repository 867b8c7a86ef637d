// ledger-core/src/chain.rs

use crate::{
    block::Block,
    transaction::Transaction,
    types::*,
    IntegrityError, LedgerError, LedgerResult,
};
use ledger_crypto::Hash;

/// Append-only sequence of blocks, starting at genesis
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Blocks indexed by position; never empty
    blocks: Vec<Block>,
}

impl Ledger {
    /// Create a new ledger from its genesis block
    pub fn new(genesis_block: Block) -> LedgerResult<Self> {
        Self::check_genesis(&genesis_block)?;
        Ok(Self { blocks: vec![genesis_block] })
    }

    /// Create a new ledger with a freshly built genesis block
    pub fn with_genesis(timestamp: Timestamp) -> LedgerResult<Self> {
        Self::new(Block::genesis(timestamp)?)
    }

    /// Rebuild a ledger from blocks loaded out of an external store.
    ///
    /// Only the genesis block is checked here; run the integrity validator
    /// over the result before trusting it.
    pub fn restore(blocks: Vec<Block>) -> LedgerResult<Self> {
        let genesis = blocks
            .first()
            .ok_or_else(|| LedgerError::InvalidGenesis("No blocks to restore".into()))?;
        Self::check_genesis(genesis)?;
        Ok(Self { blocks })
    }

    fn check_genesis(block: &Block) -> LedgerResult<()> {
        if !block.is_genesis() {
            return Err(LedgerError::InvalidGenesis(
                "First block must be genesis".into()
            ));
        }
        if !block.has_consistent_hash() {
            return Err(LedgerError::InvalidGenesis(
                "Genesis hash does not match its contents".into()
            ));
        }
        Ok(())
    }

    /// Get the genesis block
    pub fn genesis_block(&self) -> &Block {
        &self.blocks[0]
    }

    /// Get the latest block
    pub fn tip(&self) -> &Block {
        self.blocks.last().expect("ledger always holds a genesis block")
    }

    /// Get current block height
    pub fn height(&self) -> BlockNumber {
        self.tip().index
    }

    /// Number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: a ledger holds at least its genesis block
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Get block by index
    pub fn block(&self, index: BlockNumber) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    /// Check that `block` may extend the current tip
    pub fn check_extends(&self, block: &Block) -> LedgerResult<()> {
        let tip = self.tip();

        if block.index != tip.index + 1 {
            return Err(IntegrityError::IndexMismatch {
                expected: tip.index + 1,
                actual: block.index,
            }.into());
        }

        if block.previous_hash != tip.hash {
            return Err(IntegrityError::LinkageMismatch {
                index: block.index,
                expected: tip.hash,
                actual: block.previous_hash,
            }.into());
        }

        let computed = block.compute_hash()?;
        if computed != block.hash {
            return Err(IntegrityError::HashMismatch {
                index: block.index,
                stored: block.hash,
                computed,
            }.into());
        }

        if block.transactions.is_empty() {
            return Err(IntegrityError::EmptyBlock(block.index).into());
        }

        Ok(())
    }

    /// Add a new block to the chain
    pub fn append(&mut self, block: Block) -> LedgerResult<()> {
        self.check_extends(&block)?;
        tracing::debug!(index = block.index, hash = %block.hash, "Block appended");
        self.blocks.push(block);
        Ok(())
    }

    /// Find a confirmed transaction and the index of its block (linear scan)
    pub fn find_transaction(&self, hash: &Hash) -> Option<(&Transaction, BlockNumber)> {
        self.blocks.iter().find_map(|block| {
            block
                .transactions
                .iter()
                .find(|tx| tx.transaction_hash == *hash)
                .map(|tx| (tx, block.index))
        })
    }

    /// Confirmed transactions for a reference id, in chain order
    pub fn transactions_for<'a>(
        &'a self,
        reference_id: &'a str,
    ) -> impl Iterator<Item = (&'a Transaction, BlockNumber)> + 'a {
        self.blocks.iter().flat_map(move |block| {
            block
                .transactions
                .iter()
                .filter(move |tx| tx.reference_id == reference_id)
                .map(move |tx| (tx, block.index))
        })
    }

    /// Total confirmed transactions
    pub fn transaction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.transactions.len()).sum()
    }
}
