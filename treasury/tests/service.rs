//! TreasuryService: serialized concurrent access and JSON persistence

use std::sync::Arc;
use treasury::*;

const DAY: u64 = 86_400;

struct Harness {
    token: Arc<InMemoryTokenLedger>,
    currency: Arc<InMemoryCurrencyLedger>,
    members: Arc<RoleRegistry>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new(users: &[&str], tokens_each: u64) -> Self {
        let token = Arc::new(InMemoryTokenLedger::new("TKA"));
        let members = Arc::new(RoleRegistry::new());
        token.mint("admin", 10_000).unwrap();
        for user in users {
            token.transfer("admin", user, tokens_each).unwrap();
            token.approve(user, "treasury", tokens_each);
            members.grant(user);
        }
        Self {
            token,
            currency: Arc::new(InMemoryCurrencyLedger::new()),
            members,
            clock: Arc::new(ManualClock::new(1_000)),
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            token: self.token.clone(),
            currency: self.currency.clone(),
            members: self.members.clone(),
            clock: self.clock.clone(),
        }
    }

    fn service(&self) -> TreasuryService {
        let engine =
            GovernanceEngine::new(TreasuryConfig::new(DAY, "TKA", 800), self.collaborators())
                .unwrap();
        TreasuryService::new(engine)
    }
}

#[tokio::test]
async fn test_concurrent_votes_never_overlock() {
    let harness = Harness::new(&["user1"], 100);
    let service = harness.service();

    service
        .create_proposal(ProposalParams::new("recipient", 10, "proposal", DAY), 10)
        .await
        .unwrap();
    service.deposit("user1", 100).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.vote("user1", 0, 30).await.is_ok()
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            accepted += 1;
        }
    }

    // only three 30-unit locks fit in a 100-unit deposit
    assert_eq!(accepted, 3);
    assert_eq!(service.proposal(0).await.unwrap().votes, 90);
    assert_eq!(service.available("user1").await, 10);
}

#[tokio::test]
async fn test_concurrent_vote_unvote_consistent() {
    let users = ["user1", "user2", "user3", "user4"];
    let harness = Harness::new(&users, 500);
    let service = harness.service();

    service
        .create_proposal(ProposalParams::new("recipient", 10, "proposal", DAY), 10)
        .await
        .unwrap();
    for user in users {
        service.deposit(user, 500).await.unwrap();
    }

    let mut handles = Vec::new();
    for user in users {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..5 {
                service.vote(user, 0, 100).await.unwrap();
                service.unvote(user, 0).await.unwrap();
            }
            service.vote(user, 0, 250).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let votes = service.proposal(0).await.unwrap().votes;
    assert_eq!(votes, 1_000);
    service
        .inspect(|engine| assert_eq!(engine.deposits().locked_on(0), votes))
        .await;
    // 4 x (5 x (vote + unvote) + vote) plus the creation
    assert_eq!(service.events().await.len(), 45);
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("treasury.json");

    let harness = Harness::new(&["user1", "user2"], 1_000);
    let service = harness.service();
    service
        .create_proposal(ProposalParams::new("recipient", 10, "proposal", DAY), 12)
        .await
        .unwrap();
    service.deposit("user1", 600).await.unwrap();
    service.deposit("user2", 400).await.unwrap();
    service.vote("user1", 0, 600).await.unwrap();
    service.vote("user2", 0, 300).await.unwrap();
    service.save(&path).await.unwrap();

    let restored = TreasuryService::load(&path, TreasuryConfig::default(), harness.collaborators())
        .await
        .unwrap();
    assert_eq!(restored.proposal(0).await.unwrap().votes, 900);
    assert_eq!(restored.available("user2").await, 100);
    assert_eq!(restored.escrow_stats().await.surplus, 2);
    assert_eq!(restored.events().await.len(), 3);

    harness.clock.advance(DAY);
    restored.execute_proposal(0).await.unwrap();
    assert_eq!(harness.currency.balance_of("recipient"), 10);
    assert_eq!(harness.currency.balance_of("treasury"), 2);
    assert_eq!(
        restored.proposal_state(0).await.unwrap(),
        ProposalState::Executed
    );
}

#[tokio::test]
async fn test_load_missing_file_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(&[], 0);

    let service = TreasuryService::load(
        dir.path().join("absent.json"),
        TreasuryConfig::default(),
        harness.collaborators(),
    )
    .await
    .unwrap();

    assert!(service.proposals().await.is_empty());
    assert_eq!(
        service.inspect(|engine| engine.total_voting_supply()).await,
        10_000
    );
}

#[tokio::test]
async fn test_load_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("treasury.json");
    tokio::fs::write(&path, "{ not json").await.unwrap();

    let harness = Harness::new(&[], 0);
    let result = TreasuryService::load(&path, TreasuryConfig::default(), harness.collaborators()).await;
    assert!(matches!(result, Err(TreasuryError::Serialization(_))));
}

#[tokio::test]
async fn test_drain_events() {
    let harness = Harness::new(&["user1"], 100);
    let service = harness.service();
    service
        .create_proposal(ProposalParams::new("recipient", 1, "a", DAY), 1)
        .await
        .unwrap();
    service
        .create_proposal(ProposalParams::new("recipient", 2, "b", DAY), 2)
        .await
        .unwrap();

    let drained = service.drain_events().await;
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[1].proposal_id(), 1);
    assert!(service.events().await.is_empty());
}
