use rollup_transaction::AssetId;

use super::{account, ledger_for, sequencer};
use crate::error::{AuthorizationError, OnChainRejection, PipelineError};
use crate::sequencer::execution::TransferAuthorizer;
use crate::sequencer::reconstruct::StateReconstructor;
use crate::sequencer::settlement::{MockProver, ProofOracle};
use crate::sequencer::storage::Genesis;

use super::SETUP_SEED;

#[tokio::test]
async fn single_transfer_round_trip() {
    let alice = account(1);
    let bob = account(2);
    let genesis = Genesis::new().with_assets(5, alice.address());
    let ledger = ledger_for(&genesis);
    let mut seq = sequencer(&genesis, ledger.clone());

    let request = TransferAuthorizer::build(&alice, bob.address(), AssetId(1), 0);
    assert!(!seq.submit(request).unwrap());

    let receipt = seq.seal_and_submit().await.unwrap().unwrap();
    assert_eq!(receipt.event_index, 0);
    assert_eq!(receipt.requests, 1);

    // the root the ledger holds is the one computed off-chain
    let mut expected = genesis.build().unwrap();
    expected
        .apply_transfer(AssetId(1), bob.address(), 0)
        .unwrap();
    let r1 = expected.roots();
    assert_eq!(receipt.roots, r1);
    {
        let ledger = ledger.lock().await;
        assert_eq!(ledger.get_root(), r1.ownership_root);
        assert_eq!(ledger.get_nonce_root(), r1.nonce_root);
        assert_eq!(ledger.events().len(), 1);
    }

    assert_eq!(seq.state().owner(AssetId(1)).unwrap(), bob.address());
    assert_eq!(seq.state().nonce(AssetId(1)).unwrap(), 1);
    for id in 2..=5 {
        assert_eq!(seq.state().owner(AssetId(id)).unwrap(), alice.address());
        assert_eq!(seq.state().nonce(AssetId(id)).unwrap(), 0);
    }

    // an observer replaying the log lands on the same roots
    let mut observer = StateReconstructor::from_genesis(&genesis).unwrap();
    let replayed = observer.replay(ledger.lock().await.events()).unwrap();
    assert_eq!(replayed, r1);
    assert_eq!(observer.state().owner(AssetId(1)).unwrap(), bob.address());
}

#[tokio::test]
async fn chained_transfers_across_batches() {
    let alice = account(1);
    let bob = account(2);
    let carol = account(3);
    let genesis = Genesis::new().with_assets(5, alice.address());
    let ledger = ledger_for(&genesis);
    let mut seq = sequencer(&genesis, ledger.clone());

    seq.submit(TransferAuthorizer::build(&alice, bob.address(), AssetId(1), 0))
        .unwrap();
    seq.seal_and_submit().await.unwrap();

    seq.submit(TransferAuthorizer::build(&bob, carol.address(), AssetId(1), 1))
        .unwrap();
    seq.submit(TransferAuthorizer::build(&alice, carol.address(), AssetId(2), 0))
        .unwrap();
    let receipt = seq.seal_and_submit().await.unwrap().unwrap();
    assert_eq!(receipt.event_index, 1);
    assert_eq!(receipt.requests, 2);

    assert_eq!(seq.state().owner(AssetId(1)).unwrap(), carol.address());
    assert_eq!(seq.state().nonce(AssetId(1)).unwrap(), 2);
    assert_eq!(seq.state().owner(AssetId(2)).unwrap(), carol.address());
    assert_eq!(seq.roots(), ledger.lock().await.roots());

    let stats = seq.stats();
    assert_eq!(stats.batches_committed, 2);
    assert_eq!(stats.requests_committed, 3);
    assert_eq!(stats.applied_events, 2);
}

#[tokio::test]
async fn replayed_request_is_stale() {
    let alice = account(1);
    let bob = account(2);
    let genesis = Genesis::new().with_assets(5, alice.address());
    let ledger = ledger_for(&genesis);
    let mut seq = sequencer(&genesis, ledger.clone());

    let request = TransferAuthorizer::build(&alice, bob.address(), AssetId(1), 0);
    seq.submit(request.clone()).unwrap();
    seq.seal_and_submit().await.unwrap();

    let err = seq.submit(request).unwrap_err();
    assert_eq!(
        err,
        PipelineError::Authorization(AuthorizationError::StaleNonce {
            asset_id: AssetId(1),
            expected: 1,
            got: 0,
        })
    );
    assert_eq!(seq.pending_len(), 0);
}

#[tokio::test]
async fn resubmitted_proof_is_rejected_by_ledger() {
    let alice = account(1);
    let bob = account(2);
    let genesis = Genesis::new().with_assets(5, alice.address());
    let ledger = ledger_for(&genesis);

    let state = genesis.build().unwrap();
    let assembled = crate::sequencer::execution::BatchAssembler::new()
        .assemble(
            &state,
            vec![TransferAuthorizer::build(&alice, bob.address(), AssetId(1), 0)],
        )
        .unwrap();
    let proof = MockProver::new(SETUP_SEED).prove(&assembled.witness).unwrap();
    let inputs = assembled.witness.public_inputs.as_fields();

    let mut ledger = ledger.lock().await;
    ledger.update_state(&proof, inputs).unwrap();
    let roots = ledger.roots();

    assert_eq!(
        ledger.update_state(&proof, inputs).unwrap_err(),
        OnChainRejection::StaleOwnershipRoot
    );
    assert_eq!(ledger.roots(), roots);
    assert_eq!(ledger.events().len(), 1);
}

#[tokio::test]
async fn submit_rejects_unauthorized_requests() {
    let alice = account(1);
    let bob = account(2);
    let genesis = Genesis::new().with_assets(5, alice.address());
    let mut seq = sequencer(&genesis, ledger_for(&genesis));

    // bob does not own asset 1
    let err = seq
        .submit(TransferAuthorizer::build(&bob, bob.address(), AssetId(1), 0))
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Authorization(AuthorizationError::NotOwner { .. })
    ));

    seq.submit(TransferAuthorizer::build(&alice, bob.address(), AssetId(2), 0))
        .unwrap();
    let err = seq
        .submit(TransferAuthorizer::build(&alice, bob.address(), AssetId(2), 0))
        .unwrap_err();
    assert_eq!(
        err,
        PipelineError::Authorization(AuthorizationError::AssetPending {
            asset_id: AssetId(2)
        })
    );
    assert_eq!(seq.pending_len(), 1);
}
