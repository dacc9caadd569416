//! Create, stake, resolve and claim against one simulated deployment.

use alloy::primitives::Address;
use epochal_markets::chain::{ChainReader, ConfirmationPolicy};
use epochal_markets::error::{ClaimError, StakeError};
use epochal_markets::flows::{
    ClaimFlow, CreateMarketRequest, CreationOutcome, MarketCreationFlow, StakeFlow, StakeRequest,
};
use epochal_markets::market::{Category, EventType};
use rust_decimal_macros::dec;

use crate::common::{World, NOW, WALLET};

fn flows(world: &World) -> (MarketCreationFlow, StakeFlow, ClaimFlow) {
    let policy = ConfirmationPolicy::default();
    (
        MarketCreationFlow::new(
            world.chain.clone(),
            world.chain.clone(),
            world.store.clone(),
            policy,
        ),
        StakeFlow::new(
            world.chain.clone(),
            world.chain.clone(),
            world.clock.clone(),
            policy,
        ),
        ClaimFlow::new(world.chain.clone(), world.chain.clone(), policy),
    )
}

#[tokio::test]
async fn market_lifecycle_end_to_end() {
    let world = World::new();
    let (creation, stakes, claims) = flows(&world);
    let kickoff = NOW + 600;

    let request = CreateMarketRequest::new("", kickoff, "Arsenal", "Chelsea")
        .with_league("English Premier League");
    let outcome = creation.create_market(Some(WALLET), request).await.unwrap();
    let CreationOutcome::Created {
        address, persisted, ..
    } = outcome
    else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert!(persisted);

    // The address is recoverable by match.
    let found = creation
        .find_existing("Arsenal", "Chelsea", kickoff)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.address.as_deref(), Some(address.to_string().as_str()));

    // The reconciler picks the market up from the feed. Ten minutes before
    // kick-off is the pre-match epoch, so it is already live.
    world.reconciler.poll_once().await.unwrap();
    let id = address.to_string();
    let market = world.reconciler.get(&id).unwrap();
    assert_eq!(world.reconciler.view(Category::Live).len(), 1);
    assert!(world.reconciler.view(Category::Upcoming).is_empty());

    let stake = stakes
        .place_stake(
            Some(WALLET),
            &market,
            StakeRequest {
                event_type: EventType::Goal,
                outcome: 0,
                amount: dec!(1.5),
            },
        )
        .await
        .unwrap();
    assert_eq!(stake.epoch, 1);

    // Claim before resolution reverts.
    let err = claims.claim(Some(WALLET), &id, 1).await.unwrap_err();
    assert!(matches!(err, ClaimError::Reverted { .. }));

    for event in EventType::ALL {
        world.chain.resolve_pool(address, event, 1, 0);
    }
    world.reconciler.check_resolution(&id).await;
    let market = world.reconciler.get(&id).unwrap();
    assert_eq!(market.status, Some(Category::Resolved));
    assert_eq!(market.epoch_results.unwrap()[0].goal_team, "Arsenal");

    // Stakes on a resolved pool are refused by the contract.
    let err = stakes
        .place_stake(
            Some(WALLET),
            &world.reconciler.get(&id).unwrap(),
            StakeRequest {
                event_type: EventType::Goal,
                outcome: 0,
                amount: dec!(1),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StakeError::Reverted { .. }));

    let receipt = claims.claim(Some(WALLET), &id, 1).await.unwrap();
    assert!(world.chain.is_claimed(receipt.token_id));
}

#[tokio::test]
async fn claim_for_other_epoch_finds_nothing() {
    let world = World::new();
    let (creation, stakes, claims) = flows(&world);

    let outcome = creation
        .create_market(
            Some(WALLET),
            CreateMarketRequest::new("Derby", NOW + 300, "Inter", "Milan"),
        )
        .await
        .unwrap();
    let address = outcome.address().unwrap();
    world.reconciler.poll_once().await.unwrap();
    let market = world.reconciler.get(&address.to_string()).unwrap();

    stakes
        .place_stake(
            Some(WALLET),
            &market,
            StakeRequest {
                event_type: EventType::Cards,
                outcome: 1,
                amount: dec!(0.1),
            },
        )
        .await
        .unwrap();

    let err = claims
        .claim(Some(WALLET), &address.to_string(), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::NoMatchingReceipt { epoch: 2 }));

    let stranger = Address::repeat_byte(0x55);
    let err = claims
        .claim(Some(stranger), &address.to_string(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::NoReceipts));

    let pool = world
        .chain
        .epoch_pool(address, EventType::Cards, 1)
        .await
        .unwrap();
    assert!(!pool.total_stake.is_zero());
}
