use curia_types::{AccountId, Amount, DayBucket, Role, Strategy};
use serde::{Deserialize, Serialize};

/// One stakeholder's cut of a settlement event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub account: AccountId,
    pub role: Role,
    pub amount: Amount,
    pub bucket: DayBucket,
}

/// Inputs to a share computation.
#[derive(Debug, Clone)]
pub struct ShareContext<'a> {
    pub gross: Amount,
    pub submitter: AccountId,
    pub reviewers: &'a [AccountId],
    pub fee_receiver: AccountId,
    pub platform_fee_bps: u32,
    pub reviewer_share_bps: u32,
    pub mortgage_bps: u32,
    pub bucket: DayBucket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub shares: Vec<Share>,
    /// Withheld from the submitter share; released later or forfeited.
    pub escrowed: Amount,
}

impl Split {
    pub fn total(&self) -> Amount {
        self.shares.iter().map(|s| s.amount).sum::<Amount>().saturating_add(self.escrowed)
    }

    pub fn share_of(&self, account: &AccountId, role: Role) -> Amount {
        self.shares
            .iter()
            .filter(|s| &s.account == account && s.role == role)
            .map(|s| s.amount)
            .sum()
    }
}

/// Splits `ctx.gross` between platform, reviewers and submitter.
///
/// The platform takes its fee first, agreeing reviewers share their pool evenly and
/// the submitter receives the rest, including rounding dust. Only the mortgage
/// strategy escrows part of the submitter share. Shares plus escrow always equal
/// `gross`.
pub fn compute_shares(strategy: Strategy, ctx: &ShareContext<'_>) -> Split {
    let fee = ctx.gross.bps(ctx.platform_fee_bps);
    let after_fee = ctx.gross.saturating_sub(fee);

    let (per_reviewer, reviewer_total) = if ctx.reviewers.is_empty() {
        (Amount::ZERO, Amount::ZERO)
    } else {
        let pool = ctx.gross.bps(ctx.reviewer_share_bps).min(after_fee);
        let (each, dust) = pool.split_even(ctx.reviewers.len() as u64);
        (each, pool.saturating_sub(dust))
    };

    let submitter_total = after_fee.saturating_sub(reviewer_total);
    let escrowed = match strategy {
        Strategy::OneTimeWithMortgage => submitter_total.bps(ctx.mortgage_bps),
        Strategy::OneTime | Strategy::Divide => Amount::ZERO,
    };

    let mut shares = Vec::with_capacity(ctx.reviewers.len() + 2);
    let mut push = |account: AccountId, role: Role, amount: Amount| {
        if !amount.is_zero() {
            shares.push(Share {
                account,
                role,
                amount,
                bucket: ctx.bucket,
            });
        }
    };
    push(ctx.fee_receiver, Role::Platform, fee);
    for reviewer in ctx.reviewers {
        push(*reviewer, Role::Reviewer, per_reviewer);
    }
    push(ctx.submitter, Role::Submitter, submitter_total.saturating_sub(escrowed));

    Split { shares, escrowed }
}
