//! Main application entry point (native).

#[cfg(feature = "native")]
fn main() {
    use wirecanvas_app::{session, App, AppConfig, Options};
    use wirecanvas_core::Canvas;

    env_logger::init();

    let run = || -> wirecanvas_app::AppResult<()> {
        let options = Options::parse(std::env::args().skip(1))?;
        let config = options.load_config()?;
        let graph = options.load_graph()?;

        if options.headless {
            let session = options.load_session()?;
            let mut canvas = Canvas::new(config).with_graph(graph);
            println!("{}", session::run_session(&mut canvas, &session));
            return Ok(());
        }

        log::info!("Starting WireCanvas");
        let app_config = AppConfig {
            canvas: config,
            ..AppConfig::default()
        };
        App::new(app_config).with_graph(graph).run()
    };

    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "native"))]
fn main() {
    panic!("Native feature not enabled. Use `cargo run --features native`");
}
