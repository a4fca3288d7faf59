use crate::error::Result;
use async_trait::async_trait;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;

/// Program SDK seam: turns an owner key into a prepared method call.
///
/// Implementations must be safe to call again with the same owner within one
/// blockhash window. Fail with `BuildFailed` when the owner's account state
/// does not permit the action.
#[async_trait]
pub trait InstructionBuilder: Send + Sync + 'static {
    type Method: PreparedMethod;

    /// `None` means the program SDK had nothing to prepare for this owner
    async fn build(&self, owner: Pubkey) -> Result<Option<Self::Method>>;
}

/// A prepared method call that can yield its unsigned transaction
#[async_trait]
pub trait PreparedMethod: Send + Sync {
    async fn transaction(&self) -> Result<Option<Transaction>>;
}

/// Prepared method made of plain instructions paid for by `payer`
#[derive(Debug, Clone)]
pub struct InstructionMethod {
    instructions: Vec<Instruction>,
    payer: Pubkey,
}

impl InstructionMethod {
    pub fn new(payer: Pubkey) -> Self {
        Self {
            instructions: Vec::new(),
            payer,
        }
    }

    pub fn add_instruction(mut self, ix: Instruction) -> Self {
        self.instructions.push(ix);
        self
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn payer(&self) -> &Pubkey {
        &self.payer
    }
}

#[async_trait]
impl PreparedMethod for InstructionMethod {
    async fn transaction(&self) -> Result<Option<Transaction>> {
        if self.instructions.is_empty() {
            return Ok(None);
        }
        Ok(Some(Transaction::new_unsigned(Message::new(
            &self.instructions,
            Some(&self.payer),
        ))))
    }
}
