#[cfg(feature = "opcua")]
mod enabled {
    use hub_core::{HubConfig, SessionHub};
    use hub_io::OpcuaClientFactory;
    use std::env;
    use std::sync::Arc;

    pub fn main() -> Result<(), Box<dyn std::error::Error>> {
        let mut args = env::args().skip(1);
        let (Some(url), Some(node_id)) = (args.next(), args.next()) else {
            return Err("usage: ua-read <url> <nodeid>".into());
        };

        let mut config = HubConfig::new(url).with_name("ua-read");
        config.security_string = env::var("UA_READ_SECURITY").ok();
        config.username = env::var("UA_READ_USER").ok();
        config.password = env::var("UA_READ_PASSWORD").ok();
        config.validate()?;

        let hub = SessionHub::new(config, Arc::new(OpcuaClientFactory));
        hub.setup()?;
        hub.connect()?;
        let result = hub.read_value(&node_id);
        if let Err(e) = hub.close() {
            eprintln!("ua-read: {e}");
        }

        let value = result?;
        println!("{node_id} = {value} ({})", value.variant_type());
        Ok(())
    }
}

#[cfg(feature = "opcua")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    enabled::main()
}

#[cfg(not(feature = "opcua"))]
fn main() {
    eprintln!("ua-read requires the opcua feature");
    std::process::exit(2);
}
