use anyhow::Result;
use arbor_runtime::{
    h, to_wire, use_handler, use_state, Component, Session, SessionConfig, WireNode,
};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Drive a counter session and print the patches each click produces
#[derive(Parser, Debug)]
#[command(name = "arbor-counter")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of clicks to simulate
    #[arg(short, long, default_value_t = 3)]
    clicks: usize,

    /// Session config file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn counter() -> Component {
    Component::new("Counter", |ctx, _, _| {
        let (count, set_count) = use_state(ctx, || 0u32)?;
        let increment = use_handler(ctx, (), move |_| set_count.update(|count| count + 1))?;
        Ok(h("div").with_children([
            h("button").with_prop("onclick", increment).with_child("+"),
            " count: ".into(),
            count.to_string().into(),
            " ".into(),
        ]))
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };

    let mut session = Session::mount(counter().element(), config)?;
    println!("{}", serde_json::to_string(&WireNode(session.result()))?);

    for click in 1..=args.clicks {
        session.dispatch("click", &[0, 0], json!({}))?;
        let actions = session.next_render().await?;
        info!(click, actions = actions.len(), "rendered");
        println!("{}", to_wire(&actions)?);
    }

    session.unmount();
    Ok(())
}
