//! End-to-end bet lifecycle through the public contract API, a scripted
//! oracle and the local validator quorum.

use football_bets::contracts::{ContractState, FootballBets, TxContext};
use football_bets::nondet::consensus::ValidatorQuorum;
use football_bets::storage;
use football_bets::types::{Address, Bet, BetError};

use crate::mock_oracle::ScriptedOracle;

const HOME_WIN: &str = r#"{"score":"2:1","winner":1}"#;
const AWAY_WIN: &str = r#"{"score":"0:3","winner":2}"#;
const NOT_STARTED: &str = r#"{"score":"-","winner":-1}"#;
const BET_ID: &str = "2024-03-10_arsenal_chelsea";

fn player(n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = n;
    Address::new(bytes)
}

fn contract_with_bet(sender: Address) -> FootballBets {
    let mut contract = FootballBets::default();
    let id = contract
        .create_bet(sender, "2024-03-10", "Arsenal", "Chelsea", "1")
        .unwrap();
    assert_eq!(id, BET_ID);
    contract
}

fn stored_bet(contract: &FootballBets, sender: &Address) -> Bet {
    contract
        .bets
        .get(sender)
        .and_then(|bets| bets.get(&BET_ID.to_string()))
        .cloned()
        .unwrap()
}

async fn resolve(
    contract: &mut FootballBets,
    oracle: &ScriptedOracle,
    quorum: ValidatorQuorum,
    sender: Address,
    bet_id: &str,
) -> Result<(), BetError> {
    let ctx = TxContext::new(sender, oracle, &quorum);
    contract.resolve_bet(&ctx, bet_id).await
}

#[tokio::test]
async fn test_correct_prediction_scores_a_point() {
    let alice = player(1);
    let mut contract = contract_with_bet(alice);
    let oracle = ScriptedOracle::answering(HOME_WIN);

    resolve(&mut contract, &oracle, ValidatorQuorum::unanimous(3).unwrap(), alice, BET_ID)
        .await
        .unwrap();

    let bet = stored_bet(&contract, &alice);
    assert!(bet.has_resolved);
    assert_eq!(bet.real_winner, "1");
    assert_eq!(bet.real_score, "2:1");
    assert_eq!(contract.get_player_points(&alice), 1);

    // Leader plus two validators each fetched the page and asked the model.
    assert_eq!(oracle.prompt_count(), 3);
    let urls = oracle.rendered_urls();
    assert_eq!(urls.len(), 3);
    assert!(urls.iter().all(|u| u.contains("2024-03-10")));

    let prompt = oracle.last_prompt().unwrap();
    assert!(prompt.contains("Arsenal"));
    assert!(prompt.contains("Chelsea"));
}

#[tokio::test]
async fn test_unfinished_match_leaves_bet_untouched() {
    let alice = player(1);
    let mut contract = contract_with_bet(alice);
    let before = stored_bet(&contract, &alice);
    let oracle = ScriptedOracle::answering(NOT_STARTED);

    let err = resolve(&mut contract, &oracle, ValidatorQuorum::unanimous(3).unwrap(), alice, BET_ID)
        .await
        .unwrap_err();

    assert!(matches!(err, BetError::NotFinished(_)));
    assert_eq!(stored_bet(&contract, &alice), before);
    assert_eq!(contract.get_player_points(&alice), 0);
    assert!(contract.get_points().is_empty());
}

#[tokio::test]
async fn test_wrong_prediction_resolves_without_points() {
    let alice = player(1);
    let mut contract = contract_with_bet(alice);
    let oracle = ScriptedOracle::answering(AWAY_WIN);

    resolve(&mut contract, &oracle, ValidatorQuorum::unanimous(3).unwrap(), alice, BET_ID)
        .await
        .unwrap();

    let bet = stored_bet(&contract, &alice);
    assert!(bet.has_resolved);
    assert_eq!(bet.real_winner, "2");
    assert_eq!(bet.real_score, "0:3");
    assert_eq!(contract.get_player_points(&alice), 0);
}

#[tokio::test]
async fn test_resolved_bet_cannot_be_resolved_again() {
    let alice = player(1);
    let mut contract = contract_with_bet(alice);
    let oracle = ScriptedOracle::answering(HOME_WIN);
    let quorum = ValidatorQuorum::unanimous(3).unwrap();

    resolve(&mut contract, &oracle, quorum, alice, BET_ID).await.unwrap();
    let after_first = stored_bet(&contract, &alice);
    let calls = oracle.prompt_count();

    oracle.set_answers(vec![Ok(AWAY_WIN.to_string())]);
    let err = resolve(&mut contract, &oracle, quorum, alice, BET_ID)
        .await
        .unwrap_err();

    assert!(matches!(err, BetError::AlreadyResolved(_)));
    assert_eq!(stored_bet(&contract, &alice), after_first);
    assert_eq!(contract.get_player_points(&alice), 1);
    assert_eq!(oracle.prompt_count(), calls, "no oracle call for a resolved bet");
}

#[tokio::test]
async fn test_unfinished_then_finished_can_retry() {
    let alice = player(1);
    let mut contract = contract_with_bet(alice);
    let oracle = ScriptedOracle::answering(NOT_STARTED);
    let quorum = ValidatorQuorum::unanimous(3).unwrap();

    assert!(resolve(&mut contract, &oracle, quorum, alice, BET_ID).await.is_err());

    oracle.set_answers(vec![Ok(HOME_WIN.to_string())]);
    resolve(&mut contract, &oracle, quorum, alice, BET_ID).await.unwrap();
    assert_eq!(contract.get_player_points(&alice), 1);
}

#[tokio::test]
async fn test_unknown_bet_is_not_found_for_every_account() {
    let alice = player(1);
    let bob = player(2);
    let mut contract = contract_with_bet(alice);
    let oracle = ScriptedOracle::answering(HOME_WIN);
    let quorum = ValidatorQuorum::unanimous(3).unwrap();

    for sender in [alice, bob] {
        let err = resolve(&mut contract, &oracle, quorum, sender, "2024-03-10_spurs_fulham")
            .await
            .unwrap_err();
        assert!(matches!(err, BetError::NotFound(_)));
    }

    // Bets are namespaced per account: Bob cannot resolve Alice's bet.
    let err = resolve(&mut contract, &oracle, quorum, bob, BET_ID).await.unwrap_err();
    assert!(matches!(err, BetError::NotFound(_)));
    assert!(!stored_bet(&contract, &alice).has_resolved);
    assert_eq!(oracle.prompt_count(), 0);
}

#[tokio::test]
async fn test_duplicate_bet_keeps_original() {
    let alice = player(1);
    let mut contract = contract_with_bet(alice);
    let before = stored_bet(&contract, &alice);

    let err = contract
        .create_bet(alice, "2024-03-10", "ARSENAL", "chelsea", "2")
        .unwrap_err();
    assert!(matches!(err, BetError::DuplicateBet(_)));
    assert_eq!(stored_bet(&contract, &alice), before);

    // Another account may bet on the same match.
    contract
        .create_bet(player(2), "2024-03-10", "Arsenal", "Chelsea", "0")
        .unwrap();
    assert_eq!(contract.get_bets().len(), 2);
}

#[tokio::test]
async fn test_validator_disagreement_blocks_unanimous_quorum() {
    let alice = player(1);
    let mut contract = contract_with_bet(alice);
    let before = stored_bet(&contract, &alice);
    let oracle = ScriptedOracle::with_answers(vec![
        Ok(HOME_WIN.to_string()),
        Ok(HOME_WIN.to_string()),
        Ok(AWAY_WIN.to_string()),
    ]);

    let err = resolve(&mut contract, &oracle, ValidatorQuorum::unanimous(3).unwrap(), alice, BET_ID)
        .await
        .unwrap_err();

    assert!(matches!(err, BetError::ExtractionConsensus(_)));
    assert_eq!(stored_bet(&contract, &alice), before);
    assert_eq!(contract.get_player_points(&alice), 0);
}

#[tokio::test]
async fn test_majority_quorum_tolerates_one_dissenter() {
    let alice = player(1);
    let mut contract = contract_with_bet(alice);
    let oracle = ScriptedOracle::with_answers(vec![
        Ok(HOME_WIN.to_string()),
        Ok(HOME_WIN.to_string()),
        Err("model timed out".to_string()),
    ]);

    resolve(&mut contract, &oracle, ValidatorQuorum::new(3, 2).unwrap(), alice, BET_ID)
        .await
        .unwrap();
    assert_eq!(contract.get_player_points(&alice), 1);
}

#[tokio::test]
async fn test_fenced_and_spaced_answers_agree() {
    let alice = player(1);
    let mut contract = contract_with_bet(alice);
    let oracle = ScriptedOracle::with_answers(vec![
        Ok("```json\n{\"score\": \"2:1\", \"winner\": 1}\n```".to_string()),
        Ok(HOME_WIN.to_string()),
        Ok("{ \"winner\": \"1\", \"score\": \"2:1\" }".to_string()),
    ]);

    resolve(&mut contract, &oracle, ValidatorQuorum::unanimous(3).unwrap(), alice, BET_ID)
        .await
        .unwrap();
    assert_eq!(stored_bet(&contract, &alice).real_score, "2:1");
}

#[tokio::test]
async fn test_unreachable_page_is_extraction_failure() {
    let alice = player(1);
    let mut contract = contract_with_bet(alice);
    let oracle = ScriptedOracle::answering(HOME_WIN);
    oracle.set_render_error("HTTP 503 from scores page");

    let err = resolve(&mut contract, &oracle, ValidatorQuorum::unanimous(3).unwrap(), alice, BET_ID)
        .await
        .unwrap_err();

    match err {
        BetError::ExtractionConsensus(msg) => assert!(msg.contains("503")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!stored_bet(&contract, &alice).has_resolved);
}

#[tokio::test]
async fn test_malformed_answer_is_extraction_failure() {
    let alice = player(1);
    let mut contract = contract_with_bet(alice);
    let oracle = ScriptedOracle::answering("Arsenal won two to one.");

    let err = resolve(&mut contract, &oracle, ValidatorQuorum::unanimous(3).unwrap(), alice, BET_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, BetError::ExtractionConsensus(_)));
}

#[tokio::test]
async fn test_resolved_state_survives_restart() {
    let alice = player(1);
    let mut state = ContractState {
        football_bets: contract_with_bet(alice),
        ..ContractState::default()
    };
    let oracle = ScriptedOracle::answering(HOME_WIN);
    resolve(
        &mut state.football_bets,
        &oracle,
        ValidatorQuorum::unanimous(3).unwrap(),
        alice,
        BET_ID,
    )
    .await
    .unwrap();
    state.greeting.set_message("gm".to_string());

    let path = std::env::temp_dir().join(format!("football_bets_it_{}.json", uuid::Uuid::new_v4()));
    let path = path.to_string_lossy().to_string();
    storage::save_state(&state, Some(&path)).unwrap();

    let restored = storage::load_state(Some(&path)).unwrap().unwrap();
    storage::delete_state(Some(&path)).unwrap();

    assert_eq!(restored.football_bets.get_player_points(&alice), 1);
    assert_eq!(stored_bet(&restored.football_bets, &alice), stored_bet(&state.football_bets, &alice));
    assert_eq!(restored.greeting.get_message(), "gm");
}

#[tokio::test]
async fn test_finished_code_without_score_is_rejected() {
    let alice = player(1);
    let mut contract = contract_with_bet(alice);
    let before = stored_bet(&contract, &alice);

    for answer in [r#"{"score":"","winner":1}"#, r#"{"score":"-","winner":2}"#] {
        let oracle = ScriptedOracle::answering(answer);
        let err = resolve(&mut contract, &oracle, ValidatorQuorum::unanimous(3).unwrap(), alice, BET_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, BetError::ExtractionConsensus(_)), "{answer}");
    }

    assert_eq!(stored_bet(&contract, &alice), before);
    assert_eq!(contract.get_player_points(&alice), 0);
}
