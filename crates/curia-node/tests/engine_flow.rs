use curia_arbitration::ArbitrationVerdict;
use curia_node::scenario::{account, Sandbox};
use curia_node::{EngineConfig, Metrics};
use curia_review::{AuditRule, DetectionRule, ItemSpec, TaskSpec, VoteOutcome};
use curia_settlement::{SettlementConfig, SettlementOutcome};
use curia_types::{
    AccountId, Amount, BoxId, Currency, DayBucket, ErrorKind, HasErrorKind, ItemId, ItemState,
    PlatformId, Strategy, TaskId, Verdict,
};
use std::sync::Arc;

const DAY: i64 = 86_400;

fn cur() -> Currency {
    Currency::token("CUR")
}

fn units(n: u64) -> Amount {
    Amount::from_base_units(n)
}

async fn sandbox() -> Sandbox {
    let config = EngineConfig {
        settlement: SettlementConfig {
            reviewer_share_bps: 2_000,
            ..Default::default()
        },
        ..Default::default()
    };
    let sandbox = Sandbox::new(
        config,
        &["council".to_string()],
        Some(Metrics::new().unwrap()),
    );
    sandbox.tokens.fund(account("requester"), &cur(), units(10_000)).await;
    for reviewer in ["r1", "r2", "r3"] {
        sandbox.tokens.fund(account(reviewer), &cur(), units(1_000)).await;
        sandbox
            .engine
            .deposit_stake(account(reviewer), units(1_000), 0)
            .await
            .unwrap();
    }
    sandbox
}

async fn open(sandbox: &Sandbox, strategy: Strategy, reward: u64, currency: Currency) -> TaskId {
    sandbox
        .engine
        .on_task_opened(
            TaskSpec {
                requester: account("requester"),
                platform: PlatformId(1),
                box_id: BoxId(7),
                strategy,
                reward_amount: units(reward),
                currency,
                audit_rule: AuditRule::Majority { quorum: 3 },
                detection_rule: DetectionRule::default(),
                deadline: 30 * DAY,
            },
            0,
        )
        .await
        .unwrap()
}

async fn adopt(sandbox: &Sandbox, task: TaskId) -> ItemId {
    let item = sandbox
        .engine
        .on_item_submitted(
            ItemSpec {
                task_id: task,
                submitter: account("bob"),
                fingerprint: 0,
            },
            1,
        )
        .await
        .unwrap();
    let mut last = None;
    for (voter, verdict) in [("r1", Verdict::Reject), ("r2", Verdict::Support), ("r3", Verdict::Support)] {
        last = Some(
            sandbox
                .engine
                .cast_vote(item, account(voter), verdict, 2)
                .await
                .unwrap(),
        );
    }
    assert!(matches!(last, Some(VoteOutcome::Finalized { .. })));
    item
}

#[tokio::test]
async fn test_one_time_lifecycle_moves_tokens() {
    println!("🧪 One-time task from opening to claim");
    let s = sandbox().await;
    let custody = AccountId::custody();

    let task = open(&s, Strategy::OneTime, 100, cur()).await;
    assert_eq!(s.tokens.balance(account("requester"), &cur()).await, units(9_900));
    assert_eq!(s.tokens.balance(custody, &cur()).await, units(3_100));

    adopt(&s, task).await;
    assert_eq!(s.engine.credit(&account("bob")).await, 1_015);
    assert_eq!(s.engine.credit(&account("r1")).await, 900);
    assert_eq!(s.engine.stake(&account("r1")).await, units(960));
    assert_eq!(
        s.tokens.balance(AccountId::penalty_pool(), &cur()).await,
        units(40)
    );

    assert!(matches!(
        s.engine.settle(task, 10).await.unwrap(),
        SettlementOutcome::Settled(_)
    ));
    assert_eq!(s.engine.total_locked(&account("bob"), &cur()).await, units(80));
    assert_eq!(s.engine.total_locked(&account("r2"), &cur()).await, units(10));
    assert_eq!(s.engine.settle(task, 11).await.unwrap(), SettlementOutcome::NothingToSettle);

    let early = s.engine.claim(account("bob"), &cur(), &[], 10).await.unwrap();
    assert_eq!(early.total, Amount::ZERO);
    assert_eq!(early.skipped_immature, vec![DayBucket(0)]);

    let receipt = s.engine.claim(account("bob"), &cur(), &[], DAY).await.unwrap();
    assert_eq!(receipt.total, units(80));
    assert_eq!(s.tokens.balance(account("bob"), &cur()).await, units(80));

    let again = s.engine.claim(account("bob"), &cur(), &[], DAY).await.unwrap();
    assert_eq!(again.total, Amount::ZERO);

    let r2 = s
        .engine
        .claim(account("r2"), &cur(), &[DayBucket(0)], DAY)
        .await
        .unwrap();
    assert_eq!(r2.total, units(10));
    assert_eq!(s.tokens.balance(custody, &cur()).await, units(2_970));

    let metrics = s.engine.metrics().unwrap();
    assert_eq!(metrics.votes_cast.get(), 3);
    assert_eq!(metrics.items_adopted.get(), 1);
    assert_eq!(metrics.claims_total.get(), 2);
    println!("✅ Lifecycle balanced");
}

#[tokio::test]
async fn test_failed_claim_transfer_rolls_back() {
    let s = sandbox().await;
    let task = open(&s, Strategy::OneTime, 100, cur()).await;
    adopt(&s, task).await;
    s.engine.settle(task, 10).await.unwrap();

    s.tokens.block(account("bob")).await;
    let err = s
        .engine
        .claim(account("bob"), &cur(), &[], DAY)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Collaborator);
    assert_eq!(s.engine.total_locked(&account("bob"), &cur()).await, units(80));

    s.tokens.unblock(account("bob")).await;
    let receipt = s.engine.claim(account("bob"), &cur(), &[], DAY).await.unwrap();
    assert_eq!(receipt.total, units(80));
    assert_eq!(s.engine.metrics().unwrap().collaborator_failures.get(), 1);
}

#[tokio::test]
async fn test_unfunded_stake_deposit_changes_nothing() {
    let s = sandbox().await;
    let pauper = account("pauper");

    let err = s.engine.deposit_stake(pauper, units(50), 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Collaborator);
    assert_eq!(s.engine.stake(&pauper).await, Amount::ZERO);
    assert!(s.engine.snapshot().await.accounts.account(&pauper).is_none());

    let err = s
        .engine
        .withdraw_stake(account("r1"), units(5_000))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    s.engine.withdraw_stake(account("r1"), units(400)).await.unwrap();
    assert_eq!(s.tokens.balance(account("r1"), &cur()).await, units(400));
}

#[tokio::test]
async fn test_divide_settles_usage_deltas_and_mints_receipts() {
    let s = sandbox().await;
    let platform = Currency::Platform(PlatformId(1));
    let task = open(&s, Strategy::Divide, 10_000, platform.clone()).await;
    // Platform budgets are minted on claim, nothing moves up front
    assert_eq!(s.tokens.balance(account("requester"), &cur()).await, units(10_000));
    adopt(&s, task).await;

    s.usage.set(BoxId(7), 1_000).await;
    let SettlementOutcome::Settled(first) = s.engine.settle(task, 10).await.unwrap() else {
        panic!("expected settlement");
    };
    assert_eq!(first.gross, units(1_000));
    assert_eq!(first.usage_range, Some((0, 1_000)));
    assert_eq!(s.engine.settle(task, 5).await.unwrap(), SettlementOutcome::NothingToSettle);

    s.usage.set(BoxId(7), 1_500).await;
    let SettlementOutcome::Settled(second) = s.engine.settle(task, DAY).await.unwrap() else {
        panic!("expected settlement");
    };
    assert_eq!(second.gross, units(500));
    assert_eq!(s.engine.locked(&account("bob"), &platform, DayBucket(1)).await, units(400));

    s.usage.set(BoxId(7), 900).await;
    assert_eq!(s.engine.settle(task, DAY).await.unwrap(), SettlementOutcome::NothingToSettle);

    let receipt = s.engine.claim(account("bob"), &platform, &[], 2 * DAY).await.unwrap();
    assert_eq!(receipt.total, units(1_200));
    assert_eq!(s.tokens.receipts(account("bob"), PlatformId(1)).await, units(1_200));
}

#[tokio::test]
async fn test_overturn_through_engine_keeps_pool_in_sync() {
    let s = sandbox().await;
    let task = open(&s, Strategy::OneTime, 100, cur()).await;
    let item = adopt(&s, task).await;
    s.engine.settle(task, 10).await.unwrap();

    let case = s
        .engine
        .report(item, account("carol"), "ipfs://proof", 20)
        .await
        .unwrap();
    assert_eq!(s.engine.settle(task, 21).await.unwrap(), SettlementOutcome::Frozen);

    let err = s
        .engine
        .resolve(case, account("mallory"), ArbitrationVerdict::Overturned, "nope", 30)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let resolution = s
        .engine
        .resolve(case, account("council"), ArbitrationVerdict::Overturned, "ipfs://ruling", 40)
        .await
        .unwrap();
    let reversal = resolution.reversal.unwrap();

    assert_eq!(s.engine.item(item).await.unwrap().state, ItemState::Deleted);
    assert!(s.engine.task(task).await.unwrap().is_open());
    assert_eq!(s.engine.total_locked(&account("bob"), &cur()).await, Amount::ZERO);
    assert_eq!(s.engine.credit(&account("r1")).await, 1_010);
    assert_eq!(s.engine.stake(&account("r1")).await, units(1_000));

    // r2 and r3 are slashed 40 each; bob has no stake to slash
    assert_eq!(reversal.reporter_reward, units(10));
    assert_eq!(s.engine.credit(&account("carol")).await, 1_015);
    assert_eq!(s.engine.total_locked(&account("carol"), &cur()).await, units(10));

    let pool = s.engine.stats().await.penalty_pool;
    assert_eq!(pool, units(70));
    assert_eq!(s.tokens.balance(AccountId::penalty_pool(), &cur()).await, pool);

    let metrics = s.engine.metrics().unwrap();
    assert_eq!(metrics.cases_opened.get(), 1);
    assert_eq!(metrics.cases_overturned.get(), 1);
    assert_eq!(metrics.open_cases.get(), 0);
    assert_eq!(metrics.clawed_amount.get(), 100);
}

#[tokio::test]
async fn test_expired_task_refunds_requester() {
    let s = sandbox().await;
    let task = s
        .engine
        .on_task_opened(
            TaskSpec {
                requester: account("requester"),
                platform: PlatformId(1),
                box_id: BoxId(1),
                strategy: Strategy::OneTime,
                reward_amount: units(250),
                currency: cur(),
                audit_rule: AuditRule::default(),
                detection_rule: DetectionRule::Disabled,
                deadline: 1_000,
            },
            0,
        )
        .await
        .unwrap();
    let item = s
        .engine
        .on_item_submitted(
            ItemSpec {
                task_id: task,
                submitter: account("bob"),
                fingerprint: 1,
            },
            10,
        )
        .await
        .unwrap();
    assert_eq!(s.tokens.balance(account("requester"), &cur()).await, units(9_750));

    let err = s.engine.close_expired_task(task, 999).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let rejected = s.engine.close_expired_task(task, 1_001).await.unwrap();
    assert_eq!(rejected, vec![item]);
    assert_eq!(s.tokens.balance(account("requester"), &cur()).await, units(10_000));
    assert_eq!(s.engine.item(item).await.unwrap().state, ItemState::Rejected);
}

#[tokio::test]
async fn test_mortgage_escrow_released_after_hold() {
    let s = sandbox().await;
    let task = open(&s, Strategy::OneTimeWithMortgage, 1_000, cur()).await;
    adopt(&s, task).await;

    let SettlementOutcome::Settled(record) = s.engine.settle(task, 3).await.unwrap() else {
        panic!("expected settlement");
    };
    assert_eq!(record.escrowed, units(160));
    assert_eq!(s.engine.total_locked(&account("bob"), &cur()).await, units(640));

    let err = s.engine.release_mortgage(task, DAY).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotMature);

    let released = s.engine.release_mortgage(task, 3 * DAY + 10).await.unwrap();
    assert!(matches!(released, SettlementOutcome::Settled(_)));
    assert_eq!(s.engine.total_locked(&account("bob"), &cur()).await, units(800));
}

#[tokio::test]
async fn test_expired_task_cannot_be_adopted_by_arbitration() {
    let s = sandbox().await;
    let task = open(&s, Strategy::OneTime, 100, cur()).await;
    let item = s
        .engine
        .on_item_submitted(
            ItemSpec {
                task_id: task,
                submitter: account("bob"),
                fingerprint: 0,
            },
            1,
        )
        .await
        .unwrap();
    for (voter, verdict) in [("r1", Verdict::Support), ("r2", Verdict::Reject), ("r3", Verdict::Reject)] {
        s.engine.cast_vote(item, account(voter), verdict, 2).await.unwrap();
    }
    let case = s
        .engine
        .report(item, account("carol"), "ipfs://proof", 10)
        .await
        .unwrap();

    // Budget goes back to the requester while the case is still open
    s.engine.close_expired_task(task, 30 * DAY + 1).await.unwrap();
    assert_eq!(s.tokens.balance(account("requester"), &cur()).await, units(10_000));
    let custody = s.tokens.balance(AccountId::custody(), &cur()).await;

    let err = s
        .engine
        .resolve(case, account("council"), ArbitrationVerdict::Overturned, "ipfs://ruling", 30 * DAY + 2)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(s.engine.item(item).await.unwrap().state, ItemState::Deleted);
    assert_eq!(s.engine.total_locked(&account("bob"), &cur()).await, Amount::ZERO);
    assert_eq!(s.tokens.balance(AccountId::custody(), &cur()).await, custody);
    assert_eq!(s.engine.credit(&account("carol")).await, 1_000);

    s.engine
        .resolve(case, account("council"), ArbitrationVerdict::Upheld, "ipfs://ruling", 30 * DAY + 3)
        .await
        .unwrap();
    let err = s
        .engine
        .report(item, account("dave"), "ipfs://again", 30 * DAY + 4)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_readoption_after_claimed_overturn_pays_remaining_budget() {
    let s = sandbox().await;
    let task = open(&s, Strategy::OneTime, 100, cur()).await;
    let item = adopt(&s, task).await;
    s.engine.settle(task, 10).await.unwrap();
    let receipt = s.engine.claim(account("bob"), &cur(), &[], DAY).await.unwrap();
    assert_eq!(receipt.total, units(80));

    let case = s
        .engine
        .report(item, account("carol"), "ipfs://proof", DAY)
        .await
        .unwrap();
    let reversal = s
        .engine
        .resolve(case, account("council"), ArbitrationVerdict::Overturned, "ipfs://ruling", DAY)
        .await
        .unwrap()
        .reversal
        .unwrap();
    assert_eq!(reversal.clawback.unrecoverable_total(), units(80));
    assert_eq!(s.engine.snapshot().await.settlement.committed(task), units(80));

    let rival = s
        .engine
        .on_item_submitted(
            ItemSpec {
                task_id: task,
                submitter: account("dave"),
                fingerprint: u64::MAX,
            },
            2 * DAY,
        )
        .await
        .unwrap();
    for (voter, verdict) in [("r1", Verdict::Support), ("r2", Verdict::Support), ("r3", Verdict::Reject)] {
        s.engine.cast_vote(rival, account(voter), verdict, 2 * DAY).await.unwrap();
    }

    let SettlementOutcome::Settled(record) = s.engine.settle(task, 2 * DAY).await.unwrap() else {
        panic!("expected settlement");
    };
    assert_eq!(record.gross, units(20));
    assert_eq!(s.engine.locked(&account("dave"), &cur(), DayBucket(2)).await, units(16));
    assert_eq!(s.engine.locked(&account("r1"), &cur(), DayBucket(2)).await, units(2));
    assert_eq!(s.engine.snapshot().await.settlement.committed(task), units(100));
    assert_eq!(s.engine.settle(task, 2 * DAY + 1).await.unwrap(), SettlementOutcome::NothingToSettle);
}

#[tokio::test]
async fn test_second_overturn_returns_first_reporter_reward_to_pool() {
    let s = sandbox().await;
    let task = open(&s, Strategy::OneTime, 100, cur()).await;
    let item = adopt(&s, task).await;
    s.engine.settle(task, 10).await.unwrap();

    let first = s
        .engine
        .report(item, account("carol"), "ipfs://proof", 20)
        .await
        .unwrap();
    s.engine
        .resolve(first, account("council"), ArbitrationVerdict::Overturned, "ipfs://ruling", 40)
        .await
        .unwrap();
    assert_eq!(s.engine.stats().await.penalty_pool, units(70));

    let second = s
        .engine
        .report(item, account("dave"), "ipfs://counter", 50)
        .await
        .unwrap();
    let reversal = s
        .engine
        .resolve(second, account("council"), ArbitrationVerdict::Overturned, "ipfs://ruling-2", 60)
        .await
        .unwrap()
        .reversal
        .unwrap();

    let undone = reversal.prior_reporter.clone().unwrap();
    assert_eq!(undone.account, account("carol"));
    assert_eq!(undone.recovered(), units(10));
    assert_eq!(s.engine.credit(&account("carol")).await, 1_000);
    assert_eq!(s.engine.total_locked(&account("carol"), &cur()).await, Amount::ZERO);

    // r2 and r3 get their full 40 back before r1 is slashed again
    for reviewer in ["r2", "r3"] {
        assert_eq!(s.engine.stake(&account(reviewer)).await, units(1_000));
    }
    assert_eq!(s.engine.stake(&account("r1")).await, units(960));
    assert_eq!(reversal.reporter_reward, units(5));

    let pool = s.engine.stats().await.penalty_pool;
    assert_eq!(pool, units(35));
    assert_eq!(s.tokens.balance(AccountId::penalty_pool(), &cur()).await, pool);

    assert_eq!(reversal.resettled.unwrap().gross, units(100));
    assert_eq!(s.engine.total_locked(&account("bob"), &cur()).await, units(80));
    assert_eq!(s.engine.metrics().unwrap().cases_overturned.get(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_pay_out_once() {
    let s = Arc::new(sandbox().await);
    let task = open(&s, Strategy::OneTime, 100, cur()).await;
    adopt(&s, task).await;
    s.engine.settle(task, 10).await.unwrap();

    let (cur_a, cur_b) = (cur(), cur());
    let (a, b) = tokio::join!(
        s.engine.claim(account("bob"), &cur_a, &[], DAY),
        s.engine.claim(account("bob"), &cur_b, &[], DAY),
    );
    let mut totals = vec![a.unwrap().total, b.unwrap().total];

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.engine.claim(account("r2"), &cur(), &[], DAY).await })
        })
        .collect();
    let mut r2_totals = Vec::new();
    for handle in handles {
        r2_totals.push(handle.await.unwrap().unwrap().total);
    }

    totals.sort();
    assert_eq!(totals, vec![Amount::ZERO, units(80)]);
    assert_eq!(r2_totals.iter().copied().sum::<Amount>(), units(10));
    assert_eq!(r2_totals.iter().filter(|t| !t.is_zero()).count(), 1);
    assert_eq!(s.tokens.balance(account("bob"), &cur()).await, units(80));
    assert_eq!(s.tokens.balance(account("r2"), &cur()).await, units(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_finalize_exactly_once() {
    let s = Arc::new(sandbox().await);
    s.tokens.fund(account("r4"), &cur(), units(1_000)).await;
    s.engine.deposit_stake(account("r4"), units(1_000), 0).await.unwrap();
    let task = open(&s, Strategy::OneTime, 100, cur()).await;
    let item = s
        .engine
        .on_item_submitted(
            ItemSpec {
                task_id: task,
                submitter: account("bob"),
                fingerprint: 0,
            },
            1,
        )
        .await
        .unwrap();

    let voters = ["r1", "r2", "r3", "r4"];
    let handles: Vec<_> = voters
        .iter()
        .map(|voter| {
            let s = Arc::clone(&s);
            let voter = account(voter);
            tokio::spawn(async move { s.engine.cast_vote(item, voter, Verdict::Support, 2).await })
        })
        .collect();

    let (mut finalized, mut recorded, mut refused) = (0, 0, 0);
    for handle in handles {
        match handle.await.unwrap() {
            Ok(VoteOutcome::Finalized { .. }) => finalized += 1,
            Ok(VoteOutcome::Recorded { .. }) => recorded += 1,
            Err(e) => {
                assert_eq!(e.kind(), ErrorKind::InvalidState);
                refused += 1;
            }
        }
    }
    assert_eq!((finalized, recorded, refused), (1, 2, 1));
    assert_eq!(s.engine.item(item).await.unwrap().state, ItemState::Adopted);
    assert_eq!(s.engine.metrics().unwrap().votes_cast.get(), 3);

    let mut rewarded = 0;
    for voter in voters {
        if s.engine.credit(&account(voter)).await == 1_010 {
            rewarded += 1;
        }
    }
    assert_eq!(rewarded, 3);
}
