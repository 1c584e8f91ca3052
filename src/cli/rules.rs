use plugcheck::RuleSet;

pub(crate) fn run(rules: &RuleSet) {
    match rules.to_yaml() {
        Ok(yaml) => print!("{yaml}"),
        Err(e) => {
            eprintln!("plugcheck: {e}");
            std::process::exit(super::EXIT_CONFIG);
        }
    }
}
