use crate::utils::*;
use serde_json::json;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use wallet_bridge_wallets::{
    Platform, RelayError, Wallet, WalletError, WalletType,
    encoding::Encoding,
    types::{ChainInfo, SignDoc, StdSignDoc},
    walletconnect::{
        RelayEvent, RelayEventKind, SessionEventData, SessionRequest, WalletConnectParams,
    },
};

fn echo_sign_direct(client: &MockSignClient) {
    client.respond(
        "cosmos_signDirect",
        Arc::new(|req: &SessionRequest| {
            Ok(json!({ "signed": req.request.params["signDoc"].clone(), "signature": signature() }))
        }),
    );
}

async fn connected(h: &Harness) {
    h.init().await;
    h.client().add_session(live_session("t1"));
    h.store.set_connected(CHAIN, key(ADDR));
}

#[tokio::test]
async fn init_requires_project_id() {
    let h = Harness::with_project_id(WalletConnectParams::generic(), Platform::Desktop, "  ");
    let err = h.wallet.init().await.unwrap_err();
    assert!(matches!(err, WalletError::MissingConfig { setting: "walletconnect.project_id", .. }));
    assert!(err.is_not_found());
    assert_eq!(h.factory.created.load(Ordering::SeqCst), 0);

    let err = h.wallet.enable(CHAIN).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(h.client().connects.lock().is_empty());
}

#[tokio::test]
async fn init_is_idempotent() {
    let h = Harness::desktop();
    h.wallet.init().await.unwrap();
    h.wallet.init().await.unwrap();
    assert_eq!(h.factory.created.load(Ordering::SeqCst), 1);
    assert!(h.store.sign_client().is_some());
}

#[tokio::test]
async fn enable_reuses_live_session() {
    let h = Harness::desktop();
    h.init().await;
    h.client().add_session(live_session("t1"));
    h.client().respond_accounts(ADDR);

    h.wallet.enable(CHAIN).await.unwrap();

    assert!(h.client().connects.lock().is_empty());
    assert!(h.modal.opened.lock().is_empty());
    let account = h.store.account().unwrap();
    assert_eq!(account.bech32_address, ADDR);
    assert_eq!(account.address, addr_bytes());
    assert_eq!(account.pub_key, vec![2, 2, 2, 2]);
    assert_eq!(account.name, "");
    assert!(!account.is_nano_ledger && !account.is_keystone);
    assert_eq!(h.store.active_chain_ids(), vec![CHAIN.to_string()]);
    assert!(h.store.should_reconnect());
    assert_eq!(h.store.get().reconnect_connector, Some(WalletType::WalletConnect));
}

#[tokio::test]
async fn most_recent_matching_session_wins() {
    let h = Harness::desktop();
    h.init().await;
    h.client().add_session(live_session("old"));
    h.client().add_session(session("other-chain", "osmosis-1", ADDR, now_secs() + 3600));
    h.client().add_session(live_session("new"));
    h.client().add_session(session("other-chain-2", "osmosis-1", ADDR, now_secs() + 3600));

    assert_eq!(h.wallet.check_session(CHAIN).await.unwrap().topic, "new");
    assert!(h.wallet.check_session("juno-1").await.is_none());
}

#[tokio::test]
async fn expired_session_is_absent_and_disconnected_once() {
    let h = Harness::desktop();
    h.init().await;
    h.client().add_session(session("expired", CHAIN, ADDR, now_secs()));
    h.store.set_connected(CHAIN, key(ADDR));

    assert!(h.wallet.check_session(CHAIN).await.is_none());
    {
        let disconnects = h.client().disconnects.lock();
        assert_eq!(disconnects.len(), 1);
        assert_eq!(disconnects[0].0, "expired");
        assert_eq!(disconnects[0].1.code, 6000);
    }
    assert!(h.store.account().is_none());

    let err = h.wallet.get_session(CHAIN).await.unwrap_err();
    assert!(matches!(err, WalletError::NoSession { ref chain_id } if chain_id == CHAIN));
    assert_eq!(h.client().disconnects.lock().len(), 1);
}

#[tokio::test]
async fn enable_pairs_through_modal_on_desktop() {
    let h = Harness::desktop();
    h.client().approve_with(ApprovalBehavior::Approve(live_session("t1")));
    h.client().respond_accounts(ADDR);

    h.wallet.enable(CHAIN).await.unwrap();

    let connects = h.client().connects.lock().clone();
    assert_eq!(connects.len(), 1);
    let namespace = &connects[0].required_namespaces["cosmos"];
    assert_eq!(namespace.chains, vec!["cosmos:cosmoshub-4".to_string()]);
    assert_eq!(
        namespace.methods,
        vec!["cosmos_getAccounts", "cosmos_signAmino", "cosmos_signDirect"]
    );
    assert_eq!(namespace.events, vec!["chainChanged", "accountsChanged"]);

    assert_eq!(*h.modal.opened.lock(), vec![PAIRING_URI.to_string()]);
    assert_eq!(h.modal.closed.load(Ordering::SeqCst), 1);
    assert!(h.navigator.urls.lock().is_empty());
    assert_eq!(h.store.account().unwrap().bech32_address, ADDR);
    assert_eq!(h.client().request_methods(), vec!["cosmos_getAccounts"]);
}

#[tokio::test(start_paused = true)]
async fn approval_timeout_closes_modal() {
    crate::init_tracing();
    let h = Harness::desktop();
    h.client().approve_with(ApprovalBehavior::Never);

    let err = h.wallet.enable(CHAIN).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "pairing approval timed out after 40000ms");
    assert_eq!(h.modal.opened.lock().len(), 1);
    assert_eq!(h.modal.closed.load(Ordering::SeqCst), 1);
    assert!(h.store.account().is_none());
    assert!(!h.store.should_reconnect());
}

#[tokio::test]
async fn rejected_approval_surfaces_and_closes_modal() {
    let h = Harness::desktop();
    let rejected = RelayError::Rejected("user rejected".into());
    h.client().approve_with(ApprovalBehavior::Reject(rejected));

    let err = h.wallet.enable(CHAIN).await.unwrap_err();

    assert!(matches!(err, WalletError::Relay(RelayError::Rejected(_))));
    assert_eq!(h.modal.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn stuck_account_resolution_drops_session() {
    let h = Harness::desktop();
    h.init().await;
    h.client().add_session(live_session("t1"));
    h.client().hang_requests.store(true, Ordering::SeqCst);

    let err = h.wallet.enable(CHAIN).await.unwrap_err();

    assert_eq!(err.to_string(), "account resolution timed out after 10000ms");
    assert!(h.client().connects.lock().is_empty());
    assert_eq!(h.client().disconnects.lock().len(), 1);
    assert!(h.client().sessions.lock().is_empty());
}

#[tokio::test]
async fn session_unknown_to_relay_pairs_again() {
    let h = Harness::desktop();
    h.init().await;
    h.client().add_session(live_session("stale"));
    h.client().approve_with(ApprovalBehavior::Approve(live_session("fresh")));
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    h.client().respond(
        "cosmos_getAccounts",
        Arc::new(move |_: &SessionRequest| {
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(RelayError::NoMatchingKey("session topic: stale".into()))
            } else {
                Ok(json!([{ "address": ADDR, "algo": "secp256k1", "pubkey": "AgICAg==" }]))
            }
        }),
    );

    h.wallet.enable(CHAIN).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.client().connects.lock().len(), 1);
    let disconnects: Vec<_> = h.client().disconnects.lock().iter().map(|d| d.0.clone()).collect();
    assert_eq!(disconnects, vec!["stale".to_string()]);
    let topics: Vec<_> = h.client().sessions.lock().iter().map(|s| s.topic.clone()).collect();
    assert_eq!(topics, vec!["fresh".to_string()]);
    assert_eq!(h.store.account().unwrap().bech32_address, ADDR);
}

#[tokio::test]
async fn concurrent_enable_pairs_once() {
    let h = Harness::desktop();
    h.client().approve_with(ApprovalBehavior::Approve(live_session("t1")));
    h.client().respond_accounts(ADDR);

    let (a, b) = tokio::join!(h.wallet.enable(CHAIN), h.wallet.enable(CHAIN));
    a.unwrap();
    b.unwrap();

    assert_eq!(h.client().connects.lock().len(), 1);
    assert_eq!(h.factory.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mobile_pairing_deep_links_instead_of_modal() {
    let h = Harness::new(WalletConnectParams::keplr_mobile(), Platform::Ios);
    h.client().approve_with(ApprovalBehavior::Approve(live_session("t1")));
    h.client().respond_accounts(ADDR);

    h.wallet.enable(CHAIN).await.unwrap();

    assert!(h.modal.opened.lock().is_empty());
    assert_eq!(h.modal.closed.load(Ordering::SeqCst), 0);
    assert_eq!(
        *h.navigator.urls.lock(),
        vec![
            "keplrwallet://wcV2?wc%3A7f6e%402%3Frelay-protocol%3Dirn%26symKey%3D587d".to_string(),
            "keplrwallet://wcV2".to_string(),
        ]
    );
}

#[tokio::test]
async fn cosmostation_decodes_hex_pubkey() {
    let h = Harness::new(WalletConnectParams::cosmostation_mobile(), Platform::Android);
    h.init().await;
    h.client().add_session(live_session("t1"));
    h.client().respond_with(
        "cosmos_getAccounts",
        json!([{ "address": ADDR, "algo": "secp256k1", "pubkey": "02aabb" }]),
    );

    let key = h.wallet.get_key(CHAIN).await.unwrap();

    assert_eq!(key.pub_key, vec![0x02, 0xaa, 0xbb]);
    assert_eq!(
        *h.navigator.urls.lock(),
        vec![
            "cosmostation://wc#Intent;package=wannabit.io.cosmostaion;scheme=cosmostation;end;"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn empty_account_list_is_unexpected() {
    let h = Harness::desktop();
    h.init().await;
    h.client().add_session(live_session("t1"));
    h.client().respond_with("cosmos_getAccounts", json!([]));

    let err = h.wallet.get_account(CHAIN).await.unwrap_err();
    assert!(matches!(err, WalletError::UnexpectedResponse { method: "cosmos_getAccounts", .. }));
}

#[tokio::test]
async fn signing_requires_session_then_account() {
    let h = Harness::desktop();
    h.init().await;

    let err = h.wallet.sign_direct(CHAIN, ADDR, SignDoc::default()).await.unwrap_err();
    assert!(matches!(err, WalletError::NoSession { .. }));
    let err = h.wallet.sign_amino(CHAIN, ADDR, StdSignDoc::default()).await.unwrap_err();
    assert!(matches!(err, WalletError::NoSession { .. }));

    h.client().add_session(live_session("t1"));
    let err = h.wallet.sign_direct(CHAIN, ADDR, SignDoc::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "account is not defined");
    let err = h.wallet.sign_amino(CHAIN, ADDR, StdSignDoc::default()).await.unwrap_err();
    assert!(matches!(err, WalletError::AccountNotDefined));

    assert!(h.client().requests.lock().is_empty());
}

#[tokio::test]
async fn signing_over_stale_topic_tears_session_down() {
    let h = Harness::desktop();
    connected(&h).await;
    h.store.set_reconnect(WalletType::WalletConnect);
    h.client().respond(
        "cosmos_signDirect",
        Arc::new(|_: &SessionRequest| Err(RelayError::NoMatchingKey("session topic: t1".into()))),
    );

    let err = h.wallet.sign_direct(CHAIN, ADDR, SignDoc::default()).await.unwrap_err();

    assert!(matches!(err, WalletError::NoSession { ref chain_id } if chain_id == CHAIN));
    assert!(h.store.account().is_none());
    assert!(h.store.active_chain_ids().is_empty());
    assert!(!h.store.should_reconnect());
    assert!(h.client().sessions.lock().is_empty());
    let disconnects: Vec<_> = h.client().disconnects.lock().iter().map(|d| d.0.clone()).collect();
    assert_eq!(disconnects, vec!["t1".to_string()]);

    let err = h.wallet.sign_amino(CHAIN, ADDR, StdSignDoc::default()).await.unwrap_err();
    assert!(matches!(err, WalletError::NoSession { .. }));
    assert_eq!(h.client().request_methods(), vec!["cosmos_signDirect"]);
}

#[tokio::test]
async fn sign_direct_roundtrips_bytes() {
    for (params, encoding) in [
        (WalletConnectParams::keplr_mobile(), Encoding::Base64),
        (WalletConnectParams::cosmostation_mobile(), Encoding::Hex),
    ] {
        let h = Harness::new(params, Platform::Desktop);
        connected(&h).await;
        echo_sign_direct(h.client());

        let doc = SignDoc {
            body_bytes: vec![0, 1, 2, 0xfe, 0xff],
            auth_info_bytes: vec![9, 8, 7],
            chain_id: CHAIN.to_string(),
            account_number: u64::MAX,
        };
        let response = h.wallet.sign_direct(CHAIN, ADDR, doc.clone()).await.unwrap();

        similar_asserts::assert_eq!(response.signed, doc);
        assert_eq!(response.signature, signature());

        let request = h.client().requests.lock()[0].clone();
        assert_eq!(request.chain_id, "cosmos:cosmoshub-4");
        assert_eq!(request.topic, "t1");
        let params = &request.request.params;
        assert_eq!(params["signerAddress"], ADDR);
        assert_eq!(params["signDoc"]["accountNumber"], "18446744073709551615");
        assert_eq!(params["signDoc"]["bodyBytes"], encoding.encode(&doc.body_bytes));
        assert_eq!(params["signDoc"]["authInfoBytes"], encoding.encode(&doc.auth_info_bytes));
    }
}

#[tokio::test]
async fn sign_amino_passes_document_through() {
    let h = Harness::desktop();
    connected(&h).await;
    h.client().respond(
        "cosmos_signAmino",
        Arc::new(|req: &SessionRequest| {
            Ok(json!({ "signed": req.request.params["signDoc"].clone(), "signature": signature() }))
        }),
    );
    let doc = StdSignDoc {
        chain_id: CHAIN.to_string(),
        account_number: "7".to_string(),
        sequence: "3".to_string(),
        msgs: vec![json!({ "type": "cosmos-sdk/MsgSend", "value": { "amount": [] } })],
        memo: "memo".to_string(),
        ..Default::default()
    };

    let response = h.wallet.sign_amino(CHAIN, ADDR, doc.clone()).await.unwrap();

    similar_asserts::assert_eq!(response.signed, doc);
    assert_eq!(h.client().requests.lock()[0].request.params["signDoc"]["chain_id"], CHAIN);
}

#[tokio::test]
async fn suggest_chain_is_unsupported() {
    let h = Harness::desktop();
    let err = h.wallet.experimental_suggest_chain(&ChainInfo::default()).await.unwrap_err();
    assert!(matches!(
        err,
        WalletError::Unsupported {
            wallet: WalletType::WalletConnect,
            operation: "experimental_suggest_chain"
        }
    ));
}

#[tokio::test]
async fn disconnect_tears_down_everything() {
    let h = Harness::desktop();
    connected(&h).await;
    h.store.set_reconnect(WalletType::WalletConnect);
    {
        let mut pairings = h.client().pairings.lock();
        pairings.push(pairing("active", true));
        pairings.push(pairing("inactive", false));
        pairings.push(pairing("gone", false));
    }
    h.client()
        .pairing_errors
        .lock()
        .insert("gone".to_string(), RelayError::NoMatchingKey("pairing topic: gone".into()));

    h.wallet.disconnect().await.unwrap();

    let disconnects = h.client().disconnects.lock().clone();
    assert_eq!(disconnects.len(), 1);
    assert_eq!(disconnects[0].0, "t1");
    assert_eq!(disconnects[0].1.code, 6000);
    assert_eq!(disconnects[0].1.message, "User disconnected.");
    assert_eq!(
        *h.client().deleted_pairings.lock(),
        vec!["inactive".to_string(), "gone".to_string()]
    );
    assert!(h.store.account().is_none());
    assert!(h.store.active_chain_ids().is_empty());
    assert!(!h.store.get().reconnect);
    assert!(!h.store.should_reconnect());
}

#[tokio::test]
async fn disconnect_reports_pairing_failures_after_cleanup() {
    let h = Harness::desktop();
    connected(&h).await;
    h.store.set_reconnect(WalletType::WalletConnect);
    h.client().pairings.lock().push(pairing("broken", false));
    h.client()
        .pairing_errors
        .lock()
        .insert("broken".to_string(), RelayError::Transport("socket closed".into()));

    let err = h.wallet.disconnect().await.unwrap_err();

    assert!(matches!(err, WalletError::Relay(RelayError::Transport(_))));
    assert!(h.store.account().is_none());
    assert!(!h.store.should_reconnect());
}

#[tokio::test]
async fn relay_session_end_clears_local_state() {
    for event in [
        RelayEvent::SessionDelete { topic: "t1".into() },
        RelayEvent::SessionExpire { topic: "t1".into() },
    ] {
        let h = Harness::desktop();
        connected(&h).await;
        h.store.set_reconnect(WalletType::WalletConnect);
        let (reconnects, callback) = reconnect_counter();
        let _sub = h.wallet.subscription(callback);

        assert_eq!(h.client().emit(event), 1);

        assert!(h.store.account().is_none());
        assert!(!h.store.should_reconnect());
        assert_eq!(reconnects.load(Ordering::SeqCst), 0);
    }
}

fn accounts_changed(address: &str) -> RelayEvent {
    RelayEvent::SessionEvent {
        topic: "t1".into(),
        chain_id: format!("cosmos:{CHAIN}"),
        event: SessionEventData {
            name: "accountsChanged".into(),
            data: json!([format!("cosmos:{CHAIN}:{address}")]),
        },
    }
}

#[tokio::test]
async fn same_account_event_reconnects() {
    let h = Harness::desktop();
    connected(&h).await;
    let (reconnects, callback) = reconnect_counter();
    let _sub = h.wallet.subscription(callback);

    h.client().emit(accounts_changed(ADDR));

    assert_eq!(reconnects.load(Ordering::SeqCst), 1);
    assert!(h.client().requests.lock().is_empty());
}

#[tokio::test]
async fn changed_account_event_enables_again() {
    let h = Harness::desktop();
    connected(&h).await;
    h.client().respond_accounts(OTHER_ADDR);
    let (reconnects, callback) = reconnect_counter();
    let _sub = h.wallet.subscription(callback);

    h.client().emit(accounts_changed(OTHER_ADDR));
    for _ in 0..100 {
        if h.store.account().is_some_and(|key| key.bech32_address == OTHER_ADDR) {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert_eq!(h.store.account().unwrap().bech32_address, OTHER_ADDR);
    assert_eq!(reconnects.load(Ordering::SeqCst), 0);
    assert!(h.client().connects.lock().is_empty());
}

#[tokio::test]
async fn subscribing_before_init_registers_nothing() {
    let h = Harness::desktop();
    let (reconnects, callback) = reconnect_counter();

    let early = h.wallet.subscription(callback.clone());
    h.init().await;
    assert_eq!(h.client().events.listener_count(&RelayEventKind::SessionEvent), 0);
    assert_eq!(h.client().emit(accounts_changed(ADDR)), 0);
    early.unsubscribe();

    let sub = h.wallet.subscription(callback);
    assert_eq!(h.client().events.listener_count(&RelayEventKind::SessionEvent), 1);
    h.store.set_connected(CHAIN, key(ADDR));
    assert_eq!(h.client().emit(accounts_changed(ADDR)), 1);
    assert_eq!(reconnects.load(Ordering::SeqCst), 1);
    sub.unsubscribe();
}

#[tokio::test]
async fn unsubscribe_removes_all_relay_listeners() {
    let h = Harness::desktop();
    h.init().await;
    let (_, callback) = reconnect_counter();

    let kinds = [
        RelayEventKind::SessionDelete,
        RelayEventKind::SessionExpire,
        RelayEventKind::SessionEvent,
    ];

    let sub = h.wallet.subscription(callback);
    for kind in &kinds {
        assert_eq!(h.client().events.listener_count(kind), 1);
    }
    sub.unsubscribe();
    for kind in &kinds {
        assert_eq!(h.client().events.listener_count(kind), 0);
    }
}
