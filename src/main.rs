use anyhow::Context;
use clap::Parser;
use pipette_plan::utils::error::{ErrorSeverity, PlanError};
use pipette_plan::utils::{logger, validation::Validate};
use pipette_plan::{
    CliConfig, OutputFormat, SimulatedPipette, TomlRequest, TransferEngine,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting pipette-plan CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    let request = match TomlRequest::from_file(&config.config) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!("Failed to load {}", config.config);
            exit_with(&e);
        }
    };

    if config.simulate {
        // 模擬執行：依容量追蹤液量與吸頭狀態
        let plan = request.build_plan().unwrap_or_else(|e| exit_with(&e));
        // new_tip = "never" 表示呼叫端已持有吸頭
        let pipette =
            SimulatedPipette::for_tip_policy(plan.capacity(), request.options.transfer.new_tip);
        let mut engine = TransferEngine::new(pipette);
        match engine.run(plan).await {
            Ok(steps) => {
                let pipette = engine.executor();
                println!(
                    "Simulated {} step(s) using {} tip(s)",
                    steps,
                    pipette.tips_used()
                );
            }
            Err(e) => exit_with(&e),
        }
        return Ok(());
    }

    let plan = request.build_plan().unwrap_or_else(|e| exit_with(&e));
    tracing::info!(
        "Planned {} with {} cycle(s) at {} uL per tip fill",
        plan.mode(),
        plan.cycle_count(),
        plan.capacity()
    );

    for step in plan {
        match config.format {
            OutputFormat::Text => println!("{}", step),
            OutputFormat::Json => {
                let record = step
                    .to_record()
                    .with_context(|| format!("Failed to encode step {}", step))?;
                println!("{}", serde_json::to_string(&record)?);
            }
        }
    }

    Ok(())
}

fn exit_with(e: &PlanError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
