use chrono::Utc;
use clap::Args;
use credit_pro::applications::{
    CreateCreditApplicationRequest, CreditApplicationService, UpdateStatusRequest,
};
use credit_pro::error::AppError;
use credit_pro::storage::{InMemoryAuditEventRepository, InMemoryCreditApplicationRepository};
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Customer identifier used for the demo application
    #[arg(long, default_value = "CUST-DEMO-001")]
    pub(crate) customer_id: String,
    /// Requested amount; must lie strictly between 1,000 and 150,000
    #[arg(long, default_value = "50000")]
    pub(crate) amount: Decimal,
    /// Optional collateral description
    #[arg(long)]
    pub(crate) collateral: Option<String>,
    /// Status the application ends in after analysis
    #[arg(long, default_value = "Approved")]
    pub(crate) final_status: String,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        customer_id,
        amount,
        collateral,
        final_status,
    } = args;

    println!("Credit application lifecycle demo (in-memory stores)");
    let audit = Arc::new(InMemoryAuditEventRepository::default());
    let service = CreditApplicationService::new(
        Arc::new(InMemoryCreditApplicationRepository::default()),
        audit.clone(),
    );

    let created = match service
        .create_application(CreateCreditApplicationRequest {
            customer_id,
            credit_amount: amount,
            application_date: Utc::now(),
            collateral_description: collateral,
        })
        .await
    {
        Ok(created) => created,
        Err(err) => {
            println!("  Application rejected: {}", err);
            return Ok(());
        }
    };
    let id = created.application_id;
    println!(
        "- Created application {} for {} ({}) -> status {}",
        id, created.customer_id, created.credit_amount, created.status
    );

    for (status, notes) in [
        ("InAnalysis", Some("Documents received")),
        ("Pendiente", None),
        (final_status.as_str(), Some("Demo decision")),
    ] {
        let request = UpdateStatusRequest {
            new_status: status.to_string(),
            notes: notes.map(str::to_string),
        };
        match service.update_status(&id, request).await {
            Ok(updated) => println!(
                "- Status {} -> {} at {}",
                updated.previous_status, updated.new_status, updated.updated_at
            ),
            Err(err) => println!("  Status update rejected: {}", err),
        }
    }

    let found = service.get_with_history(&id).await?;
    println!(
        "\nCurrent status: {} ({} audit events stored)",
        found.application.status,
        audit.len()
    );
    println!("Audit trail");
    for event in &found.audit_history {
        println!(
            "  - {} {} -> {}",
            event.timestamp, event.event_type, event.new_state
        );
    }

    match serde_json::to_string_pretty(&found) {
        Ok(json) => println!("\nHistory payload:\n{}", json),
        Err(err) => println!("\nHistory payload unavailable: {}", err),
    }

    Ok(())
}
