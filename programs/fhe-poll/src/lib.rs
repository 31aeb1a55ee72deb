use anchor_lang::prelude::*;
use arcium_anchor::prelude::*;
use arcium_client::idl::arcium::types::CallbackAccount;

const COMP_DEF_OFFSET_INIT_TALLIES: u32 = comp_def_offset("init_tallies");
const COMP_DEF_OFFSET_CAST_BALLOT: u32 = comp_def_offset("cast_ballot");

/// Must match `poll_ledger::PROTOCOL_ID`.
pub const PROTOCOL_ID: u64 = 10001;

/// Byte offset of `PollAccount::tallies`: discriminator + bump.
const TALLIES_OFFSET: u32 = 8 + 1;
/// Two encrypted u64 counters (yes, no), 32 bytes each.
const TALLIES_LEN: u32 = 32 * 2;

declare_id!("11111111111111111111111111111111");

#[arcium_program]
pub mod fhe_poll {
    use super::*;

    // ================================================================
    // Computation Definition Initializers
    // ================================================================

    pub fn init_tallies_comp_def(ctx: Context<InitTalliesCompDef>) -> Result<()> {
        init_comp_def(ctx.accounts, None, None)?;
        Ok(())
    }

    pub fn init_cast_ballot_comp_def(ctx: Context<InitCastBallotCompDef>) -> Result<()> {
        init_comp_def(ctx.accounts, None, None)?;
        Ok(())
    }

    // ================================================================
    // Poll Setup
    // ================================================================

    /// Create the poll and queue an MPC computation that encrypts two zero
    /// counters. Until the callback lands, both tallies read as the zero
    /// placeholder.
    pub fn create_poll(
        ctx: Context<CreatePoll>,
        computation_offset: u64,
        id: u32,
        nonce: u128,
    ) -> Result<()> {
        msg!("Creating poll {}", id);

        let poll = &mut ctx.accounts.poll_acc;
        poll.bump = ctx.bumps.poll_acc;
        poll.tallies = [[0; 32]; 2];
        poll.id = id;
        poll.authority = ctx.accounts.payer.key();
        poll.nonce = nonce;

        let args = ArgBuilder::new().plaintext_u128(nonce).build();

        ctx.accounts.sign_pda_account.bump = ctx.bumps.sign_pda_account;

        queue_computation(
            ctx.accounts,
            computation_offset,
            args,
            vec![InitTalliesCallback::callback_ix(
                computation_offset,
                &ctx.accounts.mxe_account,
                &[CallbackAccount {
                    pubkey: ctx.accounts.poll_acc.key(),
                    is_writable: true,
                }],
            )?],
            1,
            0,
        )?;

        Ok(())
    }

    #[arcium_callback(encrypted_ix = "init_tallies")]
    pub fn init_tallies_callback(
        ctx: Context<InitTalliesCallback>,
        output: SignedComputationOutputs<InitTalliesOutput>,
    ) -> Result<()> {
        let o = match output.verify_output(
            &ctx.accounts.cluster_account,
            &ctx.accounts.computation_account,
        ) {
            Ok(InitTalliesOutput { field_0 }) => field_0,
            Err(_) => return Err(ErrorCode::AbortedComputation.into()),
        };

        ctx.accounts.poll_acc.tallies = o.ciphertexts;
        ctx.accounts.poll_acc.nonce = o.nonce;

        Ok(())
    }

    // ================================================================
    // Voting
    // ================================================================

    /// Submit an encrypted yes/no ballot.
    ///
    /// `choice` is the ciphertext; `vote_encryption_pubkey` and `vote_nonce`
    /// bind it to the shared secret between this voter and the MXE. The
    /// VoterRecord PDA flips to `has_voted` here, so a second call from the
    /// same signer fails with `AlreadyVoted` before anything is queued. A
    /// ballot the callback cannot verify flips it back.
    pub fn vote(
        ctx: Context<CastVote>,
        computation_offset: u64,
        id: u32,
        choice: [u8; 32],
        vote_encryption_pubkey: [u8; 32],
        vote_nonce: u128,
    ) -> Result<()> {
        let voter_record = &mut ctx.accounts.voter_record;
        require!(!voter_record.has_voted, ErrorCode::AlreadyVoted);

        voter_record.bump = ctx.bumps.voter_record;
        voter_record.poll = ctx.accounts.poll_acc.key();
        voter_record.voter = ctx.accounts.payer.key();
        voter_record.has_voted = true;

        msg!("Ballot received for poll {}", id);

        // ArgBuilder order must match circuit params:
        // cast_ballot(ballot_ctxt: Enc<Shared, Ballot>, tallies_ctxt: Enc<Mxe, PollTallies>)
        let args = ArgBuilder::new()
            .x25519_pubkey(vote_encryption_pubkey)
            .plaintext_u128(vote_nonce)
            .encrypted_u8(choice)
            .plaintext_u128(ctx.accounts.poll_acc.nonce)
            .account(ctx.accounts.poll_acc.key(), TALLIES_OFFSET, TALLIES_LEN)
            .build();

        ctx.accounts.sign_pda_account.bump = ctx.bumps.sign_pda_account;

        queue_computation(
            ctx.accounts,
            computation_offset,
            args,
            vec![CastBallotCallback::callback_ix(
                computation_offset,
                &ctx.accounts.mxe_account,
                &[
                    CallbackAccount {
                        pubkey: ctx.accounts.poll_acc.key(),
                        is_writable: true,
                    },
                    CallbackAccount {
                        pubkey: ctx.accounts.voter_record.key(),
                        is_writable: true,
                    },
                ],
            )?],
            1,
            0,
        )?;

        Ok(())
    }

    /// Store the new tallies once the cluster's signature over the result
    /// checks out.
    ///
    /// A result that fails verification leaves the tallies alone and hands
    /// the voter their ballot back. The callback has to succeed for that
    /// reset to persist, so the failure is reported through the log.
    #[arcium_callback(encrypted_ix = "cast_ballot")]
    pub fn cast_ballot_callback(
        ctx: Context<CastBallotCallback>,
        output: SignedComputationOutputs<CastBallotOutput>,
    ) -> Result<()> {
        let o = match output.verify_output(
            &ctx.accounts.cluster_account,
            &ctx.accounts.computation_account,
        ) {
            Ok(CastBallotOutput { field_0 }) => field_0,
            Err(_) => {
                let voter_record = &mut ctx.accounts.voter_record;
                voter_record.has_voted = false;
                msg!(
                    "Ballot from {} rejected: {}",
                    voter_record.voter,
                    ErrorCode::InvalidAttestation
                );
                return Ok(());
            }
        };

        ctx.accounts.poll_acc.tallies = o.ciphertexts;
        ctx.accounts.poll_acc.nonce = o.nonce;

        emit!(Voted {
            voter: ctx.accounts.voter_record.voter,
        });

        Ok(())
    }

    // ================================================================
    // Views
    // ================================================================

    pub fn has_voted(ctx: Context<HasVoted>, _voter: Pubkey) -> Result<bool> {
        let info = ctx.accounts.voter_record.to_account_info();
        if info.owner != &crate::ID || info.data_is_empty() {
            return Ok(false);
        }
        let data = info.try_borrow_data()?;
        let record = VoterRecord::try_deserialize(&mut &data[..])?;
        Ok(record.has_voted)
    }

    /// The stored ciphertexts, as-is. Decryption goes through the relayer.
    pub fn get_tallies(ctx: Context<GetTallies>) -> Result<Tallies> {
        let [yes, no] = ctx.accounts.poll_acc.tallies;
        Ok(Tallies { yes, no })
    }

    pub fn protocol_id(_ctx: Context<ProtocolId>) -> Result<u64> {
        Ok(PROTOCOL_ID)
    }
}

// ============================================================
// Account Structs: Computation Definition Initializers
// ============================================================

#[init_computation_definition_accounts("init_tallies", payer)]
#[derive(Accounts)]
pub struct InitTalliesCompDef<'info> {
    #[account(mut)]
    pub payer: Signer<'info>,
    #[account(mut, address = derive_mxe_pda!())]
    pub mxe_account: Box<Account<'info, MXEAccount>>,
    #[account(mut)]
    /// CHECK: comp_def_account, checked by arcium program.
    pub comp_def_account: UncheckedAccount<'info>,
    #[account(mut, address = derive_mxe_lut_pda!(mxe_account.lut_offset_slot))]
    /// CHECK: address_lookup_table, checked by arcium program.
    pub address_lookup_table: UncheckedAccount<'info>,
    #[account(address = LUT_PROGRAM_ID)]
    /// CHECK: lut_program is the Address Lookup Table program.
    pub lut_program: UncheckedAccount<'info>,
    pub arcium_program: Program<'info, Arcium>,
    pub system_program: Program<'info, System>,
}

#[init_computation_definition_accounts("cast_ballot", payer)]
#[derive(Accounts)]
pub struct InitCastBallotCompDef<'info> {
    #[account(mut)]
    pub payer: Signer<'info>,
    #[account(mut, address = derive_mxe_pda!())]
    pub mxe_account: Box<Account<'info, MXEAccount>>,
    #[account(mut)]
    /// CHECK: comp_def_account, checked by arcium program.
    pub comp_def_account: UncheckedAccount<'info>,
    #[account(mut, address = derive_mxe_lut_pda!(mxe_account.lut_offset_slot))]
    /// CHECK: address_lookup_table, checked by arcium program.
    pub address_lookup_table: UncheckedAccount<'info>,
    #[account(address = LUT_PROGRAM_ID)]
    /// CHECK: lut_program is the Address Lookup Table program.
    pub lut_program: UncheckedAccount<'info>,
    pub arcium_program: Program<'info, Arcium>,
    pub system_program: Program<'info, System>,
}

// ============================================================
// Account Structs: Poll
// ============================================================

#[queue_computation_accounts("init_tallies", payer)]
#[derive(Accounts)]
#[instruction(computation_offset: u64, id: u32)]
pub struct CreatePoll<'info> {
    #[account(mut)]
    pub payer: Signer<'info>,
    #[account(
        init_if_needed, space = 9, payer = payer,
        seeds = [&SIGN_PDA_SEED], bump,
        address = derive_sign_pda!(),
    )]
    pub sign_pda_account: Account<'info, ArciumSignerAccount>,
    #[account(address = derive_mxe_pda!())]
    pub mxe_account: Account<'info, MXEAccount>,
    #[account(mut, address = derive_mempool_pda!(mxe_account, ErrorCode::ClusterNotSet))]
    /// CHECK: mempool_account
    pub mempool_account: UncheckedAccount<'info>,
    #[account(mut, address = derive_execpool_pda!(mxe_account, ErrorCode::ClusterNotSet))]
    /// CHECK: executing_pool
    pub executing_pool: UncheckedAccount<'info>,
    #[account(mut, address = derive_comp_pda!(computation_offset, mxe_account, ErrorCode::ClusterNotSet))]
    /// CHECK: computation_account
    pub computation_account: UncheckedAccount<'info>,
    #[account(address = derive_comp_def_pda!(COMP_DEF_OFFSET_INIT_TALLIES))]
    pub comp_def_account: Account<'info, ComputationDefinitionAccount>,
    #[account(mut, address = derive_cluster_pda!(mxe_account, ErrorCode::ClusterNotSet))]
    pub cluster_account: Account<'info, Cluster>,
    #[account(mut, address = ARCIUM_FEE_POOL_ACCOUNT_ADDRESS)]
    pub pool_account: Account<'info, FeePool>,
    #[account(mut, address = ARCIUM_CLOCK_ACCOUNT_ADDRESS)]
    pub clock_account: Account<'info, ClockAccount>,
    pub system_program: Program<'info, System>,
    pub arcium_program: Program<'info, Arcium>,
    #[account(
        init, payer = payer,
        space = 8 + PollAccount::INIT_SPACE,
        seeds = [b"poll", payer.key().as_ref(), id.to_le_bytes().as_ref()],
        bump,
    )]
    pub poll_acc: Account<'info, PollAccount>,
}

#[callback_accounts("init_tallies")]
#[derive(Accounts)]
pub struct InitTalliesCallback<'info> {
    pub arcium_program: Program<'info, Arcium>,
    #[account(address = derive_comp_def_pda!(COMP_DEF_OFFSET_INIT_TALLIES))]
    pub comp_def_account: Account<'info, ComputationDefinitionAccount>,
    #[account(address = derive_mxe_pda!())]
    pub mxe_account: Account<'info, MXEAccount>,
    /// CHECK: computation_account
    pub computation_account: UncheckedAccount<'info>,
    #[account(address = derive_cluster_pda!(mxe_account, ErrorCode::ClusterNotSet))]
    pub cluster_account: Account<'info, Cluster>,
    #[account(address = ::anchor_lang::solana_program::sysvar::instructions::ID)]
    /// CHECK: instructions_sysvar
    pub instructions_sysvar: AccountInfo<'info>,
    #[account(mut)]
    pub poll_acc: Account<'info, PollAccount>,
}

// ============================================================
// Account Structs: Voting
// ============================================================

#[queue_computation_accounts("cast_ballot", payer)]
#[derive(Accounts)]
#[instruction(computation_offset: u64, id: u32)]
pub struct CastVote<'info> {
    #[account(mut)]
    pub payer: Signer<'info>,
    #[account(
        init_if_needed, space = 9, payer = payer,
        seeds = [&SIGN_PDA_SEED], bump,
        address = derive_sign_pda!(),
    )]
    pub sign_pda_account: Account<'info, ArciumSignerAccount>,
    #[account(address = derive_mxe_pda!())]
    pub mxe_account: Account<'info, MXEAccount>,
    #[account(mut, address = derive_mempool_pda!(mxe_account, ErrorCode::ClusterNotSet))]
    /// CHECK: mempool_account
    pub mempool_account: UncheckedAccount<'info>,
    #[account(mut, address = derive_execpool_pda!(mxe_account, ErrorCode::ClusterNotSet))]
    /// CHECK: executing_pool
    pub executing_pool: UncheckedAccount<'info>,
    #[account(mut, address = derive_comp_pda!(computation_offset, mxe_account, ErrorCode::ClusterNotSet))]
    /// CHECK: computation_account
    pub computation_account: UncheckedAccount<'info>,
    #[account(address = derive_comp_def_pda!(COMP_DEF_OFFSET_CAST_BALLOT))]
    pub comp_def_account: Account<'info, ComputationDefinitionAccount>,
    #[account(mut, address = derive_cluster_pda!(mxe_account, ErrorCode::ClusterNotSet))]
    pub cluster_account: Account<'info, Cluster>,
    #[account(mut, address = ARCIUM_FEE_POOL_ACCOUNT_ADDRESS)]
    pub pool_account: Account<'info, FeePool>,
    #[account(mut, address = ARCIUM_CLOCK_ACCOUNT_ADDRESS)]
    pub clock_account: Account<'info, ClockAccount>,
    pub system_program: Program<'info, System>,
    pub arcium_program: Program<'info, Arcium>,
    /// CHECK: Poll authority pubkey
    #[account(address = poll_acc.authority)]
    pub authority: UncheckedAccount<'info>,
    #[account(
        seeds = [b"poll", authority.key().as_ref(), id.to_le_bytes().as_ref()],
        bump = poll_acc.bump,
        has_one = authority,
    )]
    pub poll_acc: Account<'info, PollAccount>,
    #[account(
        init_if_needed, payer = payer,
        space = 8 + VoterRecord::INIT_SPACE,
        seeds = [b"voter", poll_acc.key().as_ref(), payer.key().as_ref()],
        bump,
    )]
    pub voter_record: Account<'info, VoterRecord>,
}

#[callback_accounts("cast_ballot")]
#[derive(Accounts)]
pub struct CastBallotCallback<'info> {
    pub arcium_program: Program<'info, Arcium>,
    #[account(address = derive_comp_def_pda!(COMP_DEF_OFFSET_CAST_BALLOT))]
    pub comp_def_account: Account<'info, ComputationDefinitionAccount>,
    #[account(address = derive_mxe_pda!())]
    pub mxe_account: Account<'info, MXEAccount>,
    /// CHECK: computation_account
    pub computation_account: UncheckedAccount<'info>,
    #[account(address = derive_cluster_pda!(mxe_account, ErrorCode::ClusterNotSet))]
    pub cluster_account: Account<'info, Cluster>,
    #[account(address = ::anchor_lang::solana_program::sysvar::instructions::ID)]
    /// CHECK: instructions_sysvar
    pub instructions_sysvar: AccountInfo<'info>,
    #[account(mut)]
    pub poll_acc: Account<'info, PollAccount>,
    #[account(mut)]
    pub voter_record: Account<'info, VoterRecord>,
}

// ============================================================
// Account Structs: Views
// ============================================================

#[derive(Accounts)]
#[instruction(voter: Pubkey)]
pub struct HasVoted<'info> {
    pub poll_acc: Account<'info, PollAccount>,
    /// CHECK: the voter's record PDA; absent until their first ballot.
    #[account(seeds = [b"voter", poll_acc.key().as_ref(), voter.as_ref()], bump)]
    pub voter_record: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct GetTallies<'info> {
    pub poll_acc: Account<'info, PollAccount>,
}

#[derive(Accounts)]
pub struct ProtocolId {}

// ============================================================
// State Accounts
// ============================================================

#[account]
#[derive(InitSpace)]
pub struct PollAccount {
    pub bump: u8,
    /// Encrypted tallies: [yes, no] x 32 bytes
    pub tallies: [[u8; 32]; 2],
    pub id: u32,
    pub authority: Pubkey,
    pub nonce: u128,
}

#[account]
#[derive(InitSpace)]
pub struct VoterRecord {
    pub bump: u8,
    pub poll: Pubkey,
    pub voter: Pubkey,
    pub has_voted: bool,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Tallies {
    pub yes: [u8; 32],
    pub no: [u8; 32],
}

// ============================================================
// Events
// ============================================================

#[event]
pub struct Voted {
    pub voter: Pubkey,
}

// ============================================================
// Errors
// ============================================================

#[error_code]
pub enum ErrorCode {
    #[msg("Already voted")]
    AlreadyVoted,
    #[msg("Invalid attestation")]
    InvalidAttestation,
    #[msg("Computation was aborted")]
    AbortedComputation,
    #[msg("Cluster not set")]
    ClusterNotSet,
}
