use pipette_plan::{
    CommandStep, PlanError, SimulatedPipette, TipPolicy, TomlRequest, TransferEngine, TransferMode,
    WellRef,
};
use std::io::Write;
use tempfile::NamedTempFile;

const DILUTION: &str = r#"
[instrument]
name = "p300_single"
working_volume = 300.0
trash = "trash:A1"

[[labware]]
name = "reservoir"
rows = 1
columns = 12

[[labware]]
name = "plate"
rows = 8
columns = 12

[transfer]
volume = 60.0
source = "reservoir:A1"
dest = { labware = "plate", column = 1 }

[options.transfer]
new_tip = "always"
air_gap = 10.0
disposal_volume = 20.0
touch_tip_strategy = "always"

[options.touch_tip]
speed = 1.6
"#;

fn write_request(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file
}

#[test]
fn test_request_file_builds_distribute_plan() {
    let file = write_request(DILUTION);
    let request = TomlRequest::from_file(file.path()).unwrap();
    assert_eq!(request.options.transfer.new_tip, TipPolicy::Always);

    let plan = request.build_plan().unwrap();
    assert_eq!(plan.mode(), TransferMode::Distribute);
    // 20 disposal + 10 air gap leaves room for four 60 uL drops per fill.
    assert_eq!(plan.cycle_count(), 2);

    let steps: Vec<CommandStep<WellRef>> = plan.collect();
    assert_eq!(
        steps[1],
        CommandStep::Aspirate {
            volume: 260.0,
            location: WellRef::new("reservoir", "A1"),
            rate: 1.0,
        }
    );
    let trash_blow_outs = steps
        .iter()
        .filter(|s| {
            **s == CommandStep::BlowOut {
                location: Some(WellRef::new("trash", "A1")),
            }
        })
        .count();
    assert_eq!(trash_blow_outs, 2);
}

#[tokio::test]
async fn test_request_file_simulates_cleanly() {
    let request = TomlRequest::from_toml_str(DILUTION).unwrap();
    let plan = request.build_plan().unwrap();

    let mut engine = TransferEngine::new(SimulatedPipette::new(plan.capacity()));
    engine.run(plan).await.unwrap();
    assert_eq!(engine.executor().tips_used(), 2);
}

#[test]
fn test_step_records_are_json_lines() {
    let request = TomlRequest::from_toml_str(DILUTION).unwrap();
    let records: Vec<serde_json::Value> = request
        .build_plan()
        .unwrap()
        .map(|step| serde_json::to_value(step.to_record().unwrap()).unwrap())
        .collect();

    assert_eq!(records[0]["method"], "pick_up_tip");
    assert_eq!(records[1]["method"], "aspirate");
    assert_eq!(records[1]["args"][1], "reservoir:A1");
    assert_eq!(records[3]["method"], "touch_tip");
    assert_eq!(records[3]["kwargs"]["speed"], 1.6);
}

#[test]
fn test_unknown_well_in_request() {
    let content = DILUTION.replace("column = 1", "column = 13");
    let request = TomlRequest::from_toml_str(&content).unwrap();
    assert!(matches!(
        request.build_plan(),
        Err(PlanError::UnknownWell { .. })
    ));
}

#[test]
fn test_malformed_request_is_a_toml_error() {
    let err = TomlRequest::from_toml_str("[instrument\nname = 1").unwrap_err();
    assert!(matches!(err, PlanError::TomlError(_)));
    assert!(err.is_configuration_error());
}
