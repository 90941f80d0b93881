fn main() {
    let command = match gfcat::parse(std::env::args_os(), false) {
        Ok(command) => command,
        Err(outcome) => std::process::exit(outcome.exit_code()),
    };
    let output = common::OutputConfig {
        debug: command.debug,
    };
    let connector = common::export::ExportConnector::new(common::ExportConfig::from_env());
    let connector = &connector;
    let res = common::run(output, move || async move {
        let mut stdout = tokio::io::stdout();
        let mut ctx = gfcat::Context::new(connector, &mut stdout);
        gfcat::execute(command, &mut ctx).await
    });
    match res {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(error) => {
            eprintln!("{}: {:#}", gfcat::PROGRAM, error);
            std::process::exit(1);
        }
    }
}
