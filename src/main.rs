use toolbridge_lib::backends::Backend;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }
    if let Err(error) = toolbridge_lib::run(args).await {
        eprintln!("toolbridge failed: {error}");
        std::process::exit(1);
    }
}

fn print_help() {
    println!("Usage: toolbridge <backend> [credential]");
    println!();
    println!("Serves MCP tools for <backend> over stdio.");
    println!("Backends: {}", Backend::names().join(", "));
    println!();
    println!("Environment:");
    println!("  TOOLBRIDGE_BACKEND       backend when no argument is given");
    println!("  TOOLBRIDGE_BASE_URL      override the API base URL");
    println!("  TOOLBRIDGE_TIMEOUT_SECS  per-request timeout (default 30)");
    for backend in Backend::ALL {
        println!(
            "  {:<24} {backend} credential",
            backend.credential_vars().join(" | ")
        );
        if let Some(var) = backend.tenant_var() {
            println!("  {var:<24} {backend} team scope");
        }
    }
    println!("  RUST_LOG                 log filter (logs go to stderr)");
}
