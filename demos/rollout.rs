fn help() {
    const HELP: &str = r#"
        CONTAINERAPPS_ACCESS_TOKEN=... cargo run --features login-helper --example rollout -- my-subscription my-rg my-app registry.io/my-app:v2
    "#;
    println!("{HELP}");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let mut args = std::env::args();
    // drop exec
    let _ = args.next();
    let Some(subscription_id) = args.next() else {
        help();
        return Ok(());
    };
    let Some(resource_group) = args.next() else {
        help();
        return Ok(());
    };
    let Some(app_name) = args.next() else {
        help();
        return Ok(());
    };
    let Some(image) = args.next() else {
        help();
        return Ok(());
    };

    let service = containerapps_client::login_helper::login().await?;

    let cancel = tokio_util::sync::CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let result = service
        .add_revision(
            &cancel,
            &subscription_id,
            &resource_group,
            &app_name,
            &image,
            &|msg| println!("{msg}"),
        )
        .await;

    if let Err(e) = &result {
        if let Some(suggestion) = e.suggestion() {
            eprintln!("{suggestion}");
        }
    }
    result?;

    let ingress = service
        .get_ingress_configuration(&subscription_id, &resource_group, &app_name)
        .await?;
    for host in ingress.host_names {
        println!("https://{host}");
    }

    Ok(())
}
