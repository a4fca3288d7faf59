//! Create-user instruction builder for the Gum program.
//!
//! Plugs into `signflow_sdk::GuardedExecutor` as its `InstructionBuilder`.

use async_trait::async_trait;
use borsh::BorshSerialize;
use sha2::{Digest, Sha256};
use signflow_sdk::{InstructionBuilder, InstructionMethod, SignflowError, SolConnection};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;
use std::sync::Arc;
use tracing::debug;

/// Gum program on devnet
pub const GUM_PROGRAM_ID: Pubkey = pubkey!("CDDMdCAWZkmpFcJtKb5p7Hfg7Mg4uE5dHWVSHbeRhqKT");

pub const USER_SEED: &[u8] = b"user";

#[derive(BorshSerialize)]
struct CreateUserArgs {
    random_hash: [u8; 32],
}

/// Anchor instruction discriminator: `sha256("global:<name>")[..8]`
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("global:{name}").as_bytes());
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&digest[..8]);
    discriminator
}

/// Seed for the user PDA, stable for a given owner and salt
pub fn user_random_hash(owner: &Pubkey, salt: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(USER_SEED);
    hasher.update(owner.as_ref());
    hasher.update(salt);
    hasher.finalize().into()
}

/// Derive the user PDA from program ID and random hash
pub fn derive_user_pda(program_id: &Pubkey, random_hash: &[u8; 32]) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[USER_SEED, random_hash], program_id)
}

pub fn create_user(
    program_id: &Pubkey,
    user: &Pubkey,
    authority: &Pubkey,
    random_hash: [u8; 32],
) -> Result<Instruction, SignflowError> {
    let mut data = instruction_discriminator("create_user").to_vec();
    CreateUserArgs { random_hash }
        .serialize(&mut data)
        .map_err(|e| SignflowError::BuildFailed(format!("Failed to encode arguments: {e}")))?;

    let accounts = vec![
        AccountMeta::new(*user, false),
        AccountMeta::new(*authority, true),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

pub struct CreateUserBuilder<C> {
    connection: Arc<C>,
    program_id: Pubkey,
    payer: Option<Pubkey>,
    salt: [u8; 32],
}

impl<C: SolConnection + 'static> CreateUserBuilder<C> {
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            connection,
            program_id: GUM_PROGRAM_ID,
            payer: None,
            salt: [0u8; 32],
        }
    }

    pub fn with_program_id(mut self, program_id: Pubkey) -> Self {
        self.program_id = program_id;
        self
    }

    /// Fee payer; defaults to the owner
    pub fn with_payer(mut self, payer: Pubkey) -> Self {
        self.payer = Some(payer);
        self
    }

    /// Salt mixed into the user PDA seed; change it to create another user
    /// for the same owner
    pub fn with_salt(mut self, salt: [u8; 32]) -> Self {
        self.salt = salt;
        self
    }

    pub fn user_pda(&self, owner: &Pubkey) -> Pubkey {
        derive_user_pda(&self.program_id, &user_random_hash(owner, &self.salt)).0
    }
}

#[async_trait]
impl<C: SolConnection + 'static> InstructionBuilder for CreateUserBuilder<C> {
    type Method = InstructionMethod;

    async fn build(&self, owner: Pubkey) -> Result<Option<InstructionMethod>, SignflowError> {
        let random_hash = user_random_hash(&owner, &self.salt);
        let (user, _) = derive_user_pda(&self.program_id, &random_hash);

        let existing = self
            .connection
            .get_account(&user)
            .await
            .map_err(|e| SignflowError::Connection(e.to_string()))?;
        if existing.is_some() {
            return Err(SignflowError::BuildFailed(format!(
                "User account {user} already exists"
            )));
        }

        debug!("Prepared create_user for owner {} at {}", owner, user);
        let ix = create_user(&self.program_id, &user, &owner, random_hash)?;
        Ok(Some(
            InstructionMethod::new(self.payer.unwrap_or(owner)).add_instruction(ix),
        ))
    }
}
