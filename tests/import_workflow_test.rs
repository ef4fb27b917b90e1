// ==========================================
// 导入流程集成测试
// ==========================================
// 测试目标: 表格 → 导入计划 → 确认 → 落库 → 合约级联重算
// ==========================================

mod test_helpers;

use chem_dosing::engine::normalizer::local_midnight_ms;
use chem_dosing::logging;
use chem_dosing::{ApiError, ReadingInput, StorageService};
use test_helpers::*;

const LEVELS_CSV: &str = "\
储槽名称,2024/05/01,2024/05/02,2024/05/03
CT-1 缓蚀剂,80,75,20
CT-9 不存在,10,10,10
";

#[tokio::test]
async fn test_level_import_requires_confirmation_on_anomaly() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let storage = open_storage(&db_path);
    let tank = cooling_tank("T1", "CT-1 缓蚀剂");
    storage.save_tank(&tank).await.unwrap();
    let api = create_api(storage.clone(), date(2024, 6, 30));

    let csv = write_csv(LEVELS_CSV);
    let plan = api.prepare_level_import(csv.path()).await.unwrap();

    assert_eq!(plan.candidates.len(), 3);
    assert_eq!(plan.unknown_tanks, vec!["CT-9 不存在".to_string()]);
    // 05-02 → 05-03 消耗 550 L/天，超过 300 L/天
    assert_eq!(plan.anomalies.len(), 1);
    assert!(!plan.anomalies.anomalies[0].is_possible_refill());

    let err = api.commit_level_import(&plan, false).await.unwrap_err();
    assert!(matches!(err, ApiError::ConfirmationRequired(_)));
    assert!(storage.get_readings(Some("T1")).await.unwrap().is_empty());

    let summary = api.commit_level_import(&plan, true).await.unwrap();
    assert_eq!(summary.imported, 3);
    assert_eq!(summary.alerts_saved, 1);

    let readings = storage.get_readings(Some("T1")).await.unwrap();
    let volumes: Vec<f64> = readings.iter().map(|r| r.calculated_volume).collect();
    assert_eq!(volumes, vec![800.0, 750.0, 200.0]);

    let alerts = storage.get_alerts(Some("T1")).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].date_str, "2024/05/03");
}

#[tokio::test]
async fn test_reimport_same_day_overwrites_existing_reading() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let storage = open_storage(&db_path);
    let tank = cooling_tank("T1", "CT-1 缓蚀剂");
    storage.save_tank(&tank).await.unwrap();
    let api = create_api(storage.clone(), date(2024, 6, 30));

    let first = write_csv("储槽名称,2024/05/01\nCT-1 缓蚀剂,80\n");
    let plan = api.prepare_level_import(first.path()).await.unwrap();
    api.commit_level_import(&plan, false).await.unwrap();
    let original_id = storage.get_readings(Some("T1")).await.unwrap()[0].id.clone();

    let second = write_csv("储槽名称,2024/05/01\nCT-1 缓蚀剂,70\n");
    let plan = api.prepare_level_import(second.path()).await.unwrap();
    assert_eq!(plan.updated_count, 1);
    api.commit_level_import(&plan, false).await.unwrap();

    let readings = storage.get_readings(Some("T1")).await.unwrap();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].id, original_id);
    assert_close(readings[0].level_cm, 70.0);
}

#[tokio::test]
async fn test_manual_reading_rejects_future_date() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let storage = open_storage(&db_path);
    storage.save_tank(&cooling_tank("T1", "CT-1 缓蚀剂")).await.unwrap();
    let api = create_api(storage.clone(), date(2024, 6, 30));

    let input = ReadingInput {
        tank_id: "T1".to_string(),
        date: date(2024, 7, 1),
        raw_level: "50".to_string(),
        added_amount_liters: None,
        operator_name: Some("王工".to_string()),
    };
    let err = api.prepare_manual_reading(&input).await.unwrap_err();
    assert!(matches!(err, ApiError::ImportError(_)));

    let today_input = ReadingInput {
        date: date(2024, 6, 30),
        ..input
    };
    let plan = api.prepare_manual_reading(&today_input).await.unwrap();
    let summary = api.commit_level_import(&plan, false).await.unwrap();
    assert_eq!(summary.imported, 1);

    let saved = storage.get_readings(Some("T1")).await.unwrap();
    assert_eq!(saved[0].operator_name.as_deref(), Some("王工"));
    assert_eq!(saved[0].timestamp, local_midnight_ms(date(2024, 6, 30)));
}

#[tokio::test]
async fn test_supply_save_cascades_specific_gravity() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let storage = open_storage(&db_path);
    let tank = cooling_tank("T1", "CT-1 缓蚀剂");
    storage.save_tank(&tank).await.unwrap();
    storage
        .save_readings_batch(&[
            reading(&tank, date(2024, 5, 1), 80.0),
            reading(&tank, date(2024, 5, 2), 75.0),
            reading(&tank, date(2024, 5, 3), 20.0),
        ])
        .await
        .unwrap();
    let api = create_api(storage.clone(), date(2024, 6, 30));

    let outcome = api
        .save_supply(&supply("T1", date(2024, 5, 2), 1.2, Some(50.0)), false)
        .await
        .unwrap();
    assert_eq!(outcome.recalculated, 2);

    let readings = storage.get_readings(Some("T1")).await.unwrap();
    assert_close(readings[0].applied_specific_gravity, 1.0);
    assert_eq!(readings[0].supply_id, None);
    assert_close(readings[2].applied_specific_gravity, 1.2);
    assert_close(readings[2].calculated_weight_kg, 240.0);
    assert_eq!(readings[2].supply_id.as_deref(), Some(outcome.supply_id.as_str()));

    // 重复保存同一份合约不再改动读数
    assert_eq!(api.recalc_tank("T1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_supply_out_of_range_sg_needs_confirmation() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let storage = open_storage(&db_path);
    storage.save_tank(&cooling_tank("T1", "CT-1 缓蚀剂")).await.unwrap();
    let api = create_api(storage.clone(), date(2024, 6, 30));

    let heavy = supply("T1", date(2024, 5, 1), 1.8, None);
    let err = api.save_supply(&heavy, false).await.unwrap_err();
    assert!(err.is_confirmation_required());
    assert!(storage.get_supplies(Some("T1")).await.unwrap().is_empty());

    api.save_supply(&heavy, true).await.unwrap();
    assert_eq!(storage.get_supplies(Some("T1")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_supply_import_inherits_ppm_within_batch() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let storage = open_storage(&db_path);
    storage.save_tank(&cooling_tank("T1", "CT-1 缓蚀剂")).await.unwrap();
    let api = create_api(storage.clone(), date(2024, 6, 30));

    let csv = write_csv(
        "储槽名称,供应商,药剂名称,比重,单价,生效日期,目标浓度\n\
         CT-1 缓蚀剂,甲公司,缓蚀剂A,1.1,35,2024/06/01,\n\
         CT-1 缓蚀剂,甲公司,缓蚀剂A,1.2,38,2024/01/01,45\n",
    );
    let plan = api.prepare_supply_import(csv.path()).await.unwrap();
    assert_eq!(plan.supplies.len(), 2);
    assert_eq!(plan.inherited_ppm_count, 1);

    let summary = api.commit_supply_import(&plan, false).await.unwrap();
    assert_eq!(summary.imported, 2);

    let stored = storage.get_supplies(Some("T1")).await.unwrap();
    assert_eq!(stored[0].target_ppm, Some(45.0));
    assert_eq!(stored[1].target_ppm, Some(45.0));
}
