//! Async facade tests (requires the `async` feature).

#![cfg(feature = "async")]

mod common;

use booster_binder::{AsyncBinderSdk, BinderSdk, MemoryBinderStore, PackConfig, PackOptions};

#[tokio::test]
async fn open_and_add_through_blocking_pool() {
    let builder = BinderSdk::builder()
        .pools(vec![common::pool("base2", [10, 3, 2, 1])])
        .store(MemoryBinderStore::new())
        .progression(common::progression(&["base2"]))
        .clock(common::fixed_clock());
    let sdk = AsyncBinderSdk::build(builder).await.unwrap();

    let (pack, summary) = sdk
        .open_and_add("base2", PackConfig::default(), PackOptions::seeded(1))
        .await
        .unwrap();
    assert_eq!(pack.slots.len(), 10);
    assert_eq!(summary.cards_written, 10);

    let progress = sdk.get_collection_progress("base2").await.unwrap();
    assert_eq!(progress.owned_unique, summary.new_discoveries);

    let unlocked = sdk.run(|s| Ok(s.get_unlocked_sets())).await.unwrap();
    assert_eq!(unlocked, vec!["base2"]);
}

#[tokio::test]
async fn add_cards_returns_flagged_pack() {
    let sdk = AsyncBinderSdk::new(common::memory_sdk(
        vec![common::pool("base2", [10, 3, 2, 1])],
        common::progression(&["base2"]),
    ));

    let pack = common::pack_of("base2", &["base2-c01", "base2-c01"]);
    let (pack, summary) = sdk.add_cards_to_binder(pack).await.unwrap();
    assert!(pack.slots[0].is_new);
    assert!(pack.slots[1].is_duplicate);
    assert_eq!(summary.new_discoveries, 1);
    assert_eq!(sdk.sdk().get_binder_state().cards.len(), 1);
}
