use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::foods::repo_types::FoodRecord;
use crate::foods::resolver::{self, ResolutionSource};
use crate::images::services::{delete_scan_image, owns_image_ref};
use crate::nutrients::Nutrients;
use crate::scans::dto::LogScanRequest;
use crate::scans::repo_types::{MealType, NewScanEntry, ScanEntry};
use crate::state::AppState;
use crate::timefmt::local_stamp;

const DEFAULT_PORTION_UNIT: &str = "g";

/// Validates a scan, fixes its nutrition facts and appends it to the ledger.
#[instrument(skip(st, req), fields(%user_id))]
pub async fn log_scan(
    st: &AppState,
    user_id: Uuid,
    req: LogScanRequest,
) -> Result<ScanEntry, AppError> {
    let food_name = req
        .food_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::validation("food_name is required"))?
        .to_string();

    let meal_type = req
        .meal_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<MealType>)
        .transpose()?;

    if let Some(amount) = req.portion_amount {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::validation("portion_amount must be greater than 0"));
        }
    }
    if let Some(conf) = req.ai_confidence {
        if !(0.0..=100.0).contains(&conf) {
            return Err(AppError::validation("ai_confidence must be between 0 and 100"));
        }
    }
    if let Some(image_ref) = req.image_ref.as_deref() {
        if !owns_image_ref(user_id, image_ref) {
            return Err(AppError::validation("image_ref does not belong to this user"));
        }
    }

    let (food_id, nutrients) = match req.nutrition {
        Some(snapshot) => {
            if let Some(id) = req.food_id {
                known_food(st, id).await?;
            }
            (req.food_id, snapshot)
        }
        None => nutrition_from_catalog(st, req.food_id, &food_name).await?,
    };
    nutrients.validate()?;

    let (scan_date, scan_time) = local_stamp(OffsetDateTime::now_utc(), st.config.utc_offset);
    let entry = NewScanEntry {
        user_id,
        food_id,
        food_name,
        meal_type,
        portion_amount: req.portion_amount,
        portion_unit: req
            .portion_unit
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_PORTION_UNIT.into()),
        nutrients,
        image_ref: req.image_ref,
        scan_date,
        scan_time,
        ai_confidence: req.ai_confidence,
    };

    st.ledger.append(entry).await
}

/// Explicit `food_id` first, then a name lookup. Without a catalog hit there
/// is nothing to credit.
async fn nutrition_from_catalog(
    st: &AppState,
    food_id: Option<i64>,
    food_name: &str,
) -> Result<(Option<i64>, Nutrients), AppError> {
    if let Some(id) = food_id {
        let food = known_food(st, id).await?;
        return Ok((Some(food.id), food.nutrients()));
    }

    let resolved = resolver::resolve(st.foods.as_ref(), food_name, Nutrients::ZERO).await?;
    if resolved.source == ResolutionSource::Fallback {
        return Err(AppError::validation(format!(
            "no nutrition facts for {food_name:?}; send nutrition or a known food"
        )));
    }
    Ok((resolved.food_id, resolved.nutrients))
}

async fn known_food(st: &AppState, id: i64) -> Result<FoodRecord, AppError> {
    st.foods
        .get(id)
        .await?
        .ok_or_else(|| AppError::validation(format!("unknown food_id {id}")))
}

/// Removes the scan, then drops its image. The image cleanup cannot fail the call.
#[instrument(skip(st))]
pub async fn delete_scan(st: &AppState, user_id: Uuid, id: Uuid) -> Result<ScanEntry, AppError> {
    let scan = st.ledger.remove(id, user_id).await?;
    if let Some(image_ref) = scan.image_ref.as_deref() {
        delete_scan_image(st, image_ref).await;
    }
    info!(scan_id = %id, "scan deleted");
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::images::services::{upload_scan_image, UploadItem};
    use crate::timefmt::today;

    fn request(name: &str) -> LogScanRequest {
        LogScanRequest {
            food_id: None,
            food_name: Some(name.into()),
            meal_type: Some("Lunch".into()),
            portion_amount: Some(150.0),
            portion_unit: None,
            nutrition: None,
            ai_confidence: Some(91.4),
            image_ref: None,
        }
    }

    #[tokio::test]
    async fn snapshot_is_credited_verbatim() {
        let (st, _parts) = AppState::fake_with_parts();
        let user = Uuid::new_v4();
        let mut req = request("Grilled Chicken");
        req.nutrition = Some(Nutrients::new(165.0, 31.0, 0.0, 3.6, 0.0));

        let scan = log_scan(&st, user, req).await.unwrap();
        assert_eq!(scan.food_id, None);
        assert_eq!(scan.calories, 165.0);
        assert_eq!(scan.portion_unit, "g");
        assert_eq!(scan.meal_type, Some(MealType::Lunch));

        let summary = st.ledger.summary(user, scan.scan_date).await.unwrap();
        assert_eq!(summary.meal_count, 1);
        assert_eq!(summary.total_calories, 165.0);
    }

    #[tokio::test]
    async fn label_without_snapshot_goes_through_catalog() {
        let st = AppState::fake();
        let scan = log_scan(&st, Uuid::new_v4(), request("fried rice")).await.unwrap();
        assert_eq!(scan.food_id, Some(1));
        assert_eq!(scan.food_name, "fried rice");
        assert_eq!(scan.nutrients(), Nutrients::new(333.0, 8.0, 54.0, 9.0, 1.5));
    }

    #[tokio::test]
    async fn explicit_food_id_wins_over_name() {
        let st = AppState::fake();
        let mut req = request("whatever");
        req.food_id = Some(3);
        let scan = log_scan(&st, Uuid::new_v4(), req).await.unwrap();
        assert_eq!(scan.food_id, Some(3));
        assert_eq!(scan.calories, 89.0);

        let mut req = request("whatever");
        req.food_id = Some(999);
        assert!(matches!(
            log_scan(&st, Uuid::new_v4(), req).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn snapshot_with_unknown_food_id_is_rejected_before_write() {
        let (st, parts) = AppState::fake_with_parts();
        let user = Uuid::new_v4();
        let mut req = request("Grilled Chicken");
        req.food_id = Some(999);
        req.nutrition = Some(Nutrients::new(165.0, 31.0, 0.0, 3.6, 0.0));

        let err = log_scan(&st, user, req).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)), "got {err:?}");
        assert_eq!(parts.ledger.stored_summaries().await, 0);

        let mut req = request("Grilled Chicken");
        req.food_id = Some(2);
        req.nutrition = Some(Nutrients::new(165.0, 31.0, 0.0, 3.6, 0.0));
        let scan = log_scan(&st, user, req).await.unwrap();
        assert_eq!(scan.food_id, Some(2));
    }

    #[tokio::test]
    async fn unknown_label_without_snapshot_is_rejected() {
        let st = AppState::fake();
        let user = Uuid::new_v4();
        let err = log_scan(&st, user, request("grilled chicken")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(st.ledger.summary(user, today(st.config.utc_offset)).await.unwrap().meal_count, 0);
    }

    #[tokio::test]
    async fn invalid_requests_never_reach_the_ledger() {
        let (st, parts) = AppState::fake_with_parts();
        let user = Uuid::new_v4();

        let mut cases = Vec::new();
        cases.push(LogScanRequest { food_name: Some("  ".into()), ..request("x") });
        cases.push(LogScanRequest { meal_type: Some("Brunch".into()), ..request("banana") });
        cases.push(LogScanRequest { portion_amount: Some(0.0), ..request("banana") });
        cases.push(LogScanRequest { ai_confidence: Some(100.5), ..request("banana") });
        cases.push(LogScanRequest {
            nutrition: Some(Nutrients::new(-5.0, 0.0, 0.0, 0.0, 0.0)),
            ..request("banana")
        });
        cases.push(LogScanRequest {
            image_ref: Some(format!("scans/{}/x.jpg", Uuid::new_v4())),
            ..request("banana")
        });

        for req in cases {
            let err = log_scan(&st, user, req).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "got {err:?}");
        }
        assert_eq!(parts.ledger.stored_summaries().await, 0);
    }

    #[tokio::test]
    async fn delete_debits_and_drops_the_image() {
        let (st, parts) = AppState::fake_with_parts();
        let user = Uuid::new_v4();
        let key = upload_scan_image(
            &st,
            user,
            UploadItem { body: Bytes::from_static(&[0xff, 0xd8, 0xff]), content_type: "image/jpeg".into() },
        )
        .await
        .unwrap();

        let mut req = request("banana");
        req.image_ref = Some(key.clone());
        let scan = log_scan(&st, user, req).await.unwrap();
        assert!(parts.storage.contains(&key));

        let removed = delete_scan(&st, user, scan.id).await.unwrap();
        assert_eq!(removed.id, scan.id);
        assert!(!parts.storage.contains(&key));
        let summary = st.ledger.summary(user, scan.scan_date).await.unwrap();
        assert_eq!(summary.meal_count, 0);
        assert_eq!(summary.total_calories, 0.0);

        assert!(matches!(
            delete_scan(&st, user, scan.id).await,
            Err(AppError::NotFound("scan"))
        ));
    }
}
