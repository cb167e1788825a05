//! CivicEngine behavior against the in-memory store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use voz_common::{EntityScope, GeoPoint, GovernmentEntity, Principal, ReportStatus};
use voz_engine::{CivicEngine, DedupPolicy, EngineError, ReportDraft, Transition};
use voz_store::testing::{
    Fixtures, MemoryReportStore, RIO_COPACABANA, SAO_PAULO_CENTER, SAO_PAULO_NEARBY,
};
use voz_store::ReportStore;

struct Harness {
    engine: CivicEngine,
    store: MemoryReportStore,
    fx: Fixtures,
}

async fn harness() -> Harness {
    harness_with(MemoryReportStore::new()).await
}

async fn harness_with(store: MemoryReportStore) -> Harness {
    let fx = Fixtures::seed(&store).await.unwrap();
    let engine = CivicEngine::new(Arc::new(store.clone()), DedupPolicy::default());
    Harness { engine, store, fx }
}

fn sp_draft(fx: &Fixtures, (lat, lng): (f64, f64)) -> ReportDraft {
    ReportDraft {
        title: "Poste apagado".into(),
        description: "A rua está completamente escura".into(),
        category_id: fx.lighting.id,
        latitude: lat,
        longitude: lng,
        city_id: fx.sp_city.id,
        state_id: fx.sp_state.id,
        jurisdiction: "MUNICIPAL".into(),
        photo_ref: "photos/poste.jpg".into(),
    }
}

/// `meters` due north of `SAO_PAULO_CENTER`, along a meridian.
fn north_of_center(meters: f64) -> (f64, f64) {
    let d_lat = (meters / 6_371_000.0_f64).to_degrees();
    (SAO_PAULO_CENTER.0 + d_lat, SAO_PAULO_CENTER.1)
}

async fn official_of(store: &MemoryReportStore, name: &str, scope: EntityScope) -> (Principal, GovernmentEntity) {
    let entity = store.insert_entity(name, scope).await.unwrap();
    let official = Principal::official(Uuid::new_v4());
    store.add_staff(entity.id, official.user_id).await.unwrap();
    (official, entity)
}

// =========================================================================
// Deduplication
// =========================================================================

#[tokio::test]
async fn sao_paulo_scenario_merges_nearby_report() {
    let h = harness().await;
    let alice = Principal::citizen(Uuid::new_v4());
    let bob = Principal::citizen(Uuid::new_v4());

    let first = h
        .engine
        .submit_report(&sp_draft(&h.fx, SAO_PAULO_CENTER), &alice)
        .await
        .unwrap();
    assert!(first.created);
    assert!(!first.support_added);

    let here = GeoPoint::new(SAO_PAULO_CENTER.0, SAO_PAULO_CENTER.1).unwrap();
    let near = GeoPoint::new(SAO_PAULO_NEARBY.0, SAO_PAULO_NEARBY.1).unwrap();
    let distance = here.distance_to(&near);
    assert!(distance > 50.0 && distance < 75.0, "got {distance}");

    let second = h
        .engine
        .submit_report(&sp_draft(&h.fx, SAO_PAULO_NEARBY), &bob)
        .await
        .unwrap();
    assert!(!second.created);
    assert!(second.support_added);
    assert_eq!(second.report.id, first.report.id);

    let detail = h.engine.get_report(first.report.id, &alice).await.unwrap();
    assert_eq!(detail.support_count, 1);
    assert_eq!(h.store.all_reports().await.len(), 1);
}

#[tokio::test]
async fn repeated_submission_by_same_user_adds_nothing() {
    let h = harness().await;
    let alice = Principal::citizen(Uuid::new_v4());
    let bob = Principal::citizen(Uuid::new_v4());
    let draft = sp_draft(&h.fx, SAO_PAULO_CENTER);

    let created = h.engine.submit_report(&draft, &alice).await.unwrap();
    assert!(created.created);

    for _ in 0..3 {
        let again = h.engine.submit_report(&draft, &alice).await.unwrap();
        assert!(!again.created);
        assert!(!again.support_added);
        assert_eq!(again.report.id, created.report.id);
    }
    assert!(h.store.supports_for(created.report.id).await.is_empty());

    let first = h.engine.submit_report(&draft, &bob).await.unwrap();
    assert!(first.support_added);
    for _ in 0..3 {
        let outcome = h.engine.submit_report(&draft, &bob).await.unwrap();
        assert!(!outcome.created);
        assert!(!outcome.support_added);
        assert_eq!(outcome.report.id, created.report.id);
    }

    let supports = h.store.supports_for(created.report.id).await;
    assert_eq!(supports.len(), 1);
    assert_eq!(supports[0].supporter_id, bob.user_id);
}

#[tokio::test]
async fn radius_boundary_is_inclusive() {
    let h = harness().await;
    let author = Principal::citizen(Uuid::new_v4());
    let seeded = h
        .engine
        .submit_report(&sp_draft(&h.fx, SAO_PAULO_CENTER), &author)
        .await
        .unwrap();

    let inside = h
        .engine
        .submit_report(&sp_draft(&h.fx, north_of_center(149.99)), &Principal::citizen(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(!inside.created);
    assert_eq!(inside.report.id, seeded.report.id);

    let outside = h
        .engine
        .submit_report(&sp_draft(&h.fx, north_of_center(150.01)), &Principal::citizen(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(outside.created);
    assert_ne!(outside.report.id, seeded.report.id);
}

#[tokio::test]
async fn configured_radius_is_honored() {
    let store = MemoryReportStore::new();
    let fx = Fixtures::seed(&store).await.unwrap();
    let engine = CivicEngine::new(Arc::new(store.clone()), DedupPolicy::new(50.0).unwrap());

    engine
        .submit_report(&sp_draft(&fx, SAO_PAULO_CENTER), &Principal::citizen(Uuid::new_v4()))
        .await
        .unwrap();
    // ~64m away: merged at 150m, separate at 50m.
    let outcome = engine
        .submit_report(&sp_draft(&fx, SAO_PAULO_NEARBY), &Principal::citizen(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(outcome.created);
}

#[tokio::test]
async fn different_category_never_merges() {
    let h = harness().await;
    h.engine
        .submit_report(&sp_draft(&h.fx, SAO_PAULO_CENTER), &Principal::citizen(Uuid::new_v4()))
        .await
        .unwrap();

    let mut pothole = sp_draft(&h.fx, SAO_PAULO_CENTER);
    pothole.category_id = h.fx.potholes.id;
    let outcome = h
        .engine
        .submit_report(&pothole, &Principal::citizen(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(outcome.created);
}

#[tokio::test]
async fn most_recent_candidate_wins_over_closest() {
    let h = harness().await;
    let author = Uuid::new_v4();
    let older_exact = h
        .store
        .seed_report(
            author,
            &sp_draft(&h.fx, SAO_PAULO_CENTER).normalize().unwrap(),
            Utc::now() - Duration::days(3),
        )
        .await;
    let newer_near = h
        .store
        .seed_report(
            author,
            &sp_draft(&h.fx, north_of_center(120.0)).normalize().unwrap(),
            Utc::now() - Duration::hours(1),
        )
        .await;

    let outcome = h
        .engine
        .submit_report(&sp_draft(&h.fx, SAO_PAULO_CENTER), &Principal::citizen(Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(outcome.report.id, newer_near.id);
    assert_ne!(outcome.report.id, older_exact.id);
}

#[tokio::test]
async fn sequential_submissions_never_create_two_reports_within_radius() {
    let h = harness().await;
    let offsets = [0.0, 40.0, 90.0, 149.0, 151.0, 200.0, 299.0, 310.0, 470.0];

    for meters in offsets {
        h.engine
            .submit_report(&sp_draft(&h.fx, north_of_center(meters)), &Principal::citizen(Uuid::new_v4()))
            .await
            .unwrap();
    }

    let reports = h.store.all_reports().await;
    for (i, a) in reports.iter().enumerate() {
        for b in &reports[i + 1..] {
            let d = a.location.point.distance_to(&b.location.point);
            assert!(d > 150.0, "reports {} and {} are {d}m apart", a.id, b.id);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_at_one_spot_create_one_report() {
    let h = harness().await;
    let draft = sp_draft(&h.fx, SAO_PAULO_CENTER);

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let engine = h.engine.clone();
            let draft = draft.clone();
            tokio::spawn(async move {
                engine
                    .submit_report(&draft, &Principal::citizen(Uuid::new_v4()))
                    .await
            })
        })
        .collect();

    let outcomes: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|o| o.created).count(), 1);
    assert_eq!(outcomes.iter().filter(|o| o.support_added).count(), 15);
    assert_eq!(h.store.all_reports().await.len(), 1);
    let report_id = outcomes[0].report.id;
    assert_eq!(h.store.supports_for(report_id).await.len(), 15);
}

#[tokio::test]
async fn support_race_is_absorbed_as_no_op() {
    let h = harness_with(MemoryReportStore::new().with_stale_support_reads().await).await;
    let bob = Principal::citizen(Uuid::new_v4());
    let draft = sp_draft(&h.fx, SAO_PAULO_CENTER);

    h.engine
        .submit_report(&draft, &Principal::citizen(Uuid::new_v4()))
        .await
        .unwrap();
    let first = h.engine.submit_report(&draft, &bob).await.unwrap();
    assert!(first.support_added);

    // The duplicate check misses, the unique guard catches it.
    let second = h.engine.submit_report(&draft, &bob).await.unwrap();
    assert!(!second.created);
    assert!(!second.support_added);
    assert_eq!(h.store.supports_for(first.report.id).await.len(), 1);
}

// =========================================================================
// Validation
// =========================================================================

#[tokio::test]
async fn unknown_category_and_mismatched_city_are_rejected() {
    let h = harness().await;
    let citizen = Principal::citizen(Uuid::new_v4());

    let mut bad_category = sp_draft(&h.fx, SAO_PAULO_CENTER);
    bad_category.category_id = Uuid::new_v4();
    assert!(matches!(
        h.engine.submit_report(&bad_category, &citizen).await,
        Err(EngineError::Validation(_))
    ));

    let mut wrong_state = sp_draft(&h.fx, SAO_PAULO_CENTER);
    wrong_state.state_id = h.fx.rj_state.id;
    assert!(matches!(
        h.engine.submit_report(&wrong_state, &citizen).await,
        Err(EngineError::Validation(_))
    ));

    assert!(h.store.all_reports().await.is_empty());
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn only_author_resolves_and_repeat_is_no_op() {
    let h = harness().await;
    let author = Principal::citizen(Uuid::new_v4());
    let report = h
        .engine
        .submit_report(&sp_draft(&h.fx, SAO_PAULO_CENTER), &author)
        .await
        .unwrap()
        .report;

    let stranger = Principal::citizen(Uuid::new_v4());
    assert!(matches!(
        h.engine.resolve_own_report(report.id, &stranger).await,
        Err(EngineError::Forbidden(_))
    ));

    let first = h.engine.resolve_own_report(report.id, &author).await.unwrap();
    assert_eq!(
        first.transition,
        Transition::Changed {
            from: ReportStatus::Open,
            to: ReportStatus::Resolved
        }
    );

    let second = h.engine.resolve_own_report(report.id, &author).await.unwrap();
    assert_eq!(second.transition, Transition::Unchanged);
    assert_eq!(second.report.status, ReportStatus::Resolved);

    assert!(matches!(
        h.engine.resolve_own_report(Uuid::new_v4(), &author).await,
        Err(EngineError::NotFound("report"))
    ));
}

#[tokio::test]
async fn city_official_cannot_touch_state_report() {
    let h = harness().await;
    let (official, _) = official_of(&h.store, "Prefeitura de São Paulo", EntityScope::City(h.fx.sp_city.id)).await;

    let mut draft = sp_draft(&h.fx, SAO_PAULO_CENTER);
    draft.jurisdiction = "STATE".into();
    let report = h
        .engine
        .submit_report(&draft, &Principal::citizen(Uuid::new_v4()))
        .await
        .unwrap()
        .report;

    let err = h
        .engine
        .official_set_status(report.id, &official, "UNDER_REVIEW")
        .await
        .unwrap_err();
    match err {
        EngineError::Forbidden(msg) => assert!(!msg.contains("STATE")),
        other => panic!("expected forbidden, got {other:?}"),
    }

    let unchanged = h.engine.get_report(report.id, &official).await.unwrap();
    assert_eq!(unchanged.report.status, ReportStatus::Open);
}

#[tokio::test]
async fn federal_and_private_reports_are_visible_only_to_their_author() {
    let h = harness().await;
    let (city_official, _) = official_of(&h.store, "Prefeitura de São Paulo", EntityScope::City(h.fx.sp_city.id)).await;
    let (state_official, _) = official_of(&h.store, "Governo de SP", EntityScope::State(h.fx.sp_state.id)).await;
    let author = Principal::citizen(Uuid::new_v4());
    let stranger = Principal::citizen(Uuid::new_v4());

    for (jurisdiction, category) in [("FEDERAL", h.fx.lighting.id), ("PRIVATE", h.fx.potholes.id)] {
        let mut draft = sp_draft(&h.fx, SAO_PAULO_CENTER);
        draft.jurisdiction = jurisdiction.into();
        draft.category_id = category;
        let report = h.engine.submit_report(&draft, &author).await.unwrap().report;

        let detail = h.engine.get_report(report.id, &author).await.unwrap();
        assert_eq!(detail.report.id, report.id);

        for viewer in [&stranger, &city_official, &state_official] {
            assert!(matches!(
                h.engine.get_report(report.id, viewer).await,
                Err(EngineError::NotFound("report"))
            ));
            assert!(matches!(
                h.engine.list_comments(report.id, viewer).await,
                Err(EngineError::NotFound("report"))
            ));
            assert!(matches!(
                h.engine.add_comment(report.id, viewer, "Vi também").await,
                Err(EngineError::NotFound("report"))
            ));
        }
    }

    assert!(h.engine.my_jurisdiction_reports(&city_official).await.unwrap().is_empty());
    assert!(h.engine.my_jurisdiction_reports(&state_official).await.unwrap().is_empty());
    assert_eq!(h.engine.my_reports(&author).await.unwrap().len(), 2);
    assert!(h.engine.my_reports(&stranger).await.unwrap().is_empty());
}

#[tokio::test]
async fn official_with_jurisdiction_sets_any_status() {
    let h = harness().await;
    let (official, _) = official_of(&h.store, "Prefeitura de São Paulo", EntityScope::City(h.fx.sp_city.id)).await;
    let report = h
        .engine
        .submit_report(&sp_draft(&h.fx, SAO_PAULO_CENTER), &Principal::citizen(Uuid::new_v4()))
        .await
        .unwrap()
        .report;

    let review = h
        .engine
        .official_set_status(report.id, &official, "UNDER_REVIEW")
        .await
        .unwrap();
    assert!(review.transition.is_changed());

    h.engine
        .official_set_status(report.id, &official, "RESOLVED")
        .await
        .unwrap();
    let reopened = h
        .engine
        .official_set_status(report.id, &official, "OPEN")
        .await
        .unwrap();
    assert_eq!(reopened.report.status, ReportStatus::Open);

    assert!(matches!(
        h.engine.official_set_status(report.id, &official, "CLOSED").await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn citizen_cannot_set_status_even_if_listed_as_staff() {
    let h = harness().await;
    let entity = h
        .store
        .insert_entity("Prefeitura", EntityScope::City(h.fx.sp_city.id))
        .await
        .unwrap();
    let citizen = Principal::citizen(Uuid::new_v4());
    h.store.add_staff(entity.id, citizen.user_id).await.unwrap();

    let report = h
        .engine
        .submit_report(&sp_draft(&h.fx, SAO_PAULO_CENTER), &Principal::citizen(Uuid::new_v4()))
        .await
        .unwrap()
        .report;

    assert!(h.engine.authority_of(&citizen).await.unwrap().is_none());
    assert!(matches!(
        h.engine.official_set_status(report.id, &citizen, "RESOLVED").await,
        Err(EngineError::Forbidden(_))
    ));
}

// =========================================================================
// Jurisdiction listings and official responses
// =========================================================================

#[tokio::test]
async fn jurisdiction_listing_matches_scope() {
    let h = harness().await;
    let (city_official, _) = official_of(&h.store, "Prefeitura de São Paulo", EntityScope::City(h.fx.sp_city.id)).await;
    let (state_official, _) = official_of(&h.store, "Governo do Rio", EntityScope::State(h.fx.rj_state.id)).await;
    let citizen = Principal::citizen(Uuid::new_v4());

    let municipal = h
        .engine
        .submit_report(&sp_draft(&h.fx, SAO_PAULO_CENTER), &citizen)
        .await
        .unwrap()
        .report;

    let mut rio = sp_draft(&h.fx, RIO_COPACABANA);
    rio.city_id = h.fx.rj_city.id;
    rio.state_id = h.fx.rj_state.id;
    rio.jurisdiction = "STATE".into();
    let rio_state = h.engine.submit_report(&rio, &citizen).await.unwrap().report;

    let mut federal = sp_draft(&h.fx, north_of_center(5_000.0));
    federal.jurisdiction = "FEDERAL".into();
    h.engine.submit_report(&federal, &citizen).await.unwrap();

    let city_reports = h.engine.my_jurisdiction_reports(&city_official).await.unwrap();
    assert_eq!(city_reports.iter().map(|r| r.id).collect::<Vec<_>>(), vec![municipal.id]);

    let state_reports = h.engine.my_jurisdiction_reports(&state_official).await.unwrap();
    assert_eq!(state_reports.iter().map(|r| r.id).collect::<Vec<_>>(), vec![rio_state.id]);

    assert!(h.engine.my_jurisdiction_reports(&citizen).await.unwrap().is_empty());
    let unaffiliated = Principal::official(Uuid::new_v4());
    assert!(h.engine.my_jurisdiction_reports(&unaffiliated).await.unwrap().is_empty());
}

#[tokio::test]
async fn multi_entity_staff_acts_for_lowest_entity_id() {
    let h = harness().await;
    let a = h
        .store
        .insert_entity("Prefeitura", EntityScope::City(h.fx.sp_city.id))
        .await
        .unwrap();
    let b = h
        .store
        .insert_entity("Governo", EntityScope::State(h.fx.sp_state.id))
        .await
        .unwrap();
    let official = Principal::official(Uuid::new_v4());
    h.store.add_staff(a.id, official.user_id).await.unwrap();
    h.store.add_staff(b.id, official.user_id).await.unwrap();

    let authority = h.engine.authority_of(&official).await.unwrap().unwrap();
    assert_eq!(authority.id, a.id.min(b.id));
}

#[tokio::test]
async fn official_response_is_gated_and_unique() {
    let h = harness().await;
    let (official, entity) = official_of(&h.store, "Prefeitura de São Paulo", EntityScope::City(h.fx.sp_city.id)).await;
    let (outsider, _) = official_of(&h.store, "Prefeitura do Rio", EntityScope::City(h.fx.rj_city.id)).await;
    let report = h
        .engine
        .submit_report(&sp_draft(&h.fx, SAO_PAULO_CENTER), &Principal::citizen(Uuid::new_v4()))
        .await
        .unwrap()
        .report;

    assert!(matches!(
        h.engine.submit_official_response(report.id, &outsider, "Vamos ver").await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        h.engine.submit_official_response(report.id, &official, "   ").await,
        Err(EngineError::Validation(_))
    ));

    let response = h
        .engine
        .submit_official_response(report.id, &official, "Equipe enviada ao local")
        .await
        .unwrap();
    assert_eq!(response.entity_id, entity.id);

    assert!(matches!(
        h.engine.submit_official_response(report.id, &official, "De novo").await,
        Err(EngineError::Conflict(_))
    ));

    let detail = h.engine.get_report(report.id, &official).await.unwrap();
    assert_eq!(detail.official_response.map(|r| r.id), Some(response.id));

    let mine = h.engine.my_official_responses(&official).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert!(h.engine.my_official_responses(&outsider).await.unwrap().is_empty());
}

// =========================================================================
// Comments
// =========================================================================

#[tokio::test]
async fn comments_are_listed_in_order_and_deleted_only_by_author() {
    let h = harness().await;
    let author = Principal::citizen(Uuid::new_v4());
    let other = Principal::citizen(Uuid::new_v4());
    let report = h
        .engine
        .submit_report(&sp_draft(&h.fx, SAO_PAULO_CENTER), &author)
        .await
        .unwrap()
        .report;

    let first = h.engine.add_comment(report.id, &author, "Continua apagado").await.unwrap();
    let second = h.engine.add_comment(report.id, &other, "Aqui também").await.unwrap();

    let listed = h.engine.list_comments(report.id, &other).await.unwrap();
    assert_eq!(listed.iter().map(|c| c.id).collect::<Vec<_>>(), vec![first.id, second.id]);

    assert!(matches!(
        h.engine.delete_comment(first.id, &other).await,
        Err(EngineError::Forbidden(_))
    ));
    h.engine.delete_comment(first.id, &author).await.unwrap();
    assert!(matches!(
        h.engine.delete_comment(first.id, &author).await,
        Err(EngineError::NotFound("comment"))
    ));

    assert!(matches!(
        h.engine.add_comment(Uuid::new_v4(), &author, "Oi").await,
        Err(EngineError::NotFound("report"))
    ));
    assert!(matches!(
        h.engine.add_comment(report.id, &author, "  ").await,
        Err(EngineError::Validation(_))
    ));
}
