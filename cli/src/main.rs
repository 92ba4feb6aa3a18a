mod breaker_sim;
mod publisher;
mod subscriber;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "sv")]
#[command(about = "IEC 61850-9-2 sampled values demo tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Publish a synthetic three-phase measurement stream.
    Publish {
        /// Interface to transmit on; empty picks the first up interface.
        #[arg(long, default_value = "")]
        interface: String,

        #[arg(long, default_value = "SV01")]
        svcb: String,

        #[arg(long, default_value = "01:0C:CD:04:00:01")]
        mac: String,

        #[arg(long, default_value_t = 0x4000)]
        app_id: u16,

        #[arg(long, default_value_t = 0)]
        vlan_id: u16,

        #[arg(long, default_value_t = 4)]
        priority: u8,

        /// Frames per second.
        #[arg(long, default_value_t = 50.0)]
        rate: f64,

        /// How long to publish before exiting.
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,

        /// Nominal phase current in amperes.
        #[arg(long, default_value_t = 100.0)]
        current: f64,

        /// Nominal phase-to-neutral voltage in volts.
        #[arg(long, default_value_t = 230.0)]
        voltage: f64,
    },
    /// Subscribe and feed the protection relays.
    Subscribe {
        #[arg(long, default_value = "")]
        interface: String,

        #[arg(long, default_value_t = 0x4000)]
        app_id: u16,

        /// How long to listen before exiting.
        #[arg(long, default_value_t = 30.0)]
        seconds: f64,

        /// Command trip() on a demo breaker when a relay fires.
        #[arg(long, default_value_t = false)]
        trip_breaker: bool,
    },
    /// Run a scripted breaker fault scenario.
    BreakerSim {
        #[arg(long, default_value_t = 400.0)]
        voltage: f64,

        #[arg(long, default_value_t = 100.0)]
        nominal: f64,

        #[arg(long, default_value_t = 5000.0)]
        fault: f64,

        #[arg(long, default_value_t = 0.5)]
        fault_time: f64,

        #[arg(long, default_value_t = 2.0)]
        duration: f64,

        #[arg(long, default_value_t = 0.01)]
        time_step: f64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Publish {
            interface,
            svcb,
            mac,
            app_id,
            vlan_id,
            priority,
            rate,
            seconds,
            current,
            voltage,
        } => publisher::run(publisher::PublishArgs {
            interface,
            svcb,
            mac,
            app_id,
            vlan_id,
            priority,
            rate,
            seconds,
            current,
            voltage,
        }),
        Commands::Subscribe {
            interface,
            app_id,
            seconds,
            trip_breaker,
        } => subscriber::run(&interface, app_id, seconds, trip_breaker),
        Commands::BreakerSim {
            voltage,
            nominal,
            fault,
            fault_time,
            duration,
            time_step,
        } => breaker_sim::run(voltage, nominal, fault, fault_time, duration, time_step),
    };

    if let Err(err) = outcome {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
