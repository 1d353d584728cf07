use clap::{Args, Parser, Subcommand};
use cs_alkalinity::{MICRO, TitrationSample, acid_mass_from_ph_ta, ph_from_ta, ta_from_ph};
use cs_app::AppResult;
use cs_core::units::{as_grams, grams};
use cs_core::{CorrelatedValue, SeawaterState};
use cs_dye::{Dye, KCalibration, equilibrium_constant, ph_from_ratio, tris_buffer_ph};
use tracing::info;

#[derive(Parser)]
#[command(name = "cs-cli")]
#[command(about = "carbspec CLI - seawater pH and alkalinity from indicator dyes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Temperature and salinity of the sample.
#[derive(Args)]
struct StateArgs {
    /// Temperature in °C
    #[arg(long, default_value_t = 25.0)]
    temperature: f64,
    /// Practical salinity
    #[arg(long, default_value_t = 35.0)]
    salinity: f64,
}

impl StateArgs {
    fn state(&self) -> AppResult<SeawaterState> {
        Ok(SeawaterState::from_celsius(self.temperature, self.salinity)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Dye dissociation constant K
    K {
        /// Dye name (BPB, BPB_CAM1, MCP, MCP_CAM1)
        #[arg(long)]
        dye: Dye,
        /// K calibration (published or tris)
        #[arg(long, default_value = "published")]
        calibration: KCalibration,
        #[command(flatten)]
        state: StateArgs,
    },
    /// pH from a two-point absorbance ratio
    PhFromRatio {
        #[arg(long)]
        dye: Dye,
        /// Background-corrected base/acid absorbance ratio
        #[arg(long)]
        ratio: f64,
        #[command(flatten)]
        state: StateArgs,
    },
    /// Total alkalinity from an end-point pH
    Ta {
        #[arg(long)]
        ph: f64,
        /// Sample mass in g
        #[arg(long)]
        sample_mass: f64,
        /// Acid mass in g
        #[arg(long)]
        acid_mass: f64,
        /// Acid concentration in mol/kg
        #[arg(long)]
        acid_concentration: f64,
        #[command(flatten)]
        state: StateArgs,
    },
    /// End-point pH expected for a given alkalinity
    PhFromTa {
        /// Total alkalinity in µmol/kg
        #[arg(long)]
        ta: f64,
        #[arg(long)]
        sample_mass: f64,
        #[arg(long)]
        acid_mass: f64,
        #[arg(long)]
        acid_concentration: f64,
        #[command(flatten)]
        state: StateArgs,
    },
    /// Acid mass needed to reach an end-point pH
    AcidMass {
        #[arg(long)]
        ph: f64,
        /// Total alkalinity in µmol/kg
        #[arg(long)]
        ta: f64,
        #[arg(long)]
        sample_mass: f64,
        #[arg(long)]
        acid_concentration: f64,
        #[command(flatten)]
        state: StateArgs,
    },
    /// pH of Tris-buffered artificial seawater
    TrisPh {
        #[command(flatten)]
        state: StateArgs,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::K {
            dye,
            calibration,
            state,
        } => cmd_k(dye, calibration, &state.state()?),
        Commands::PhFromRatio { dye, ratio, state } => cmd_ph_from_ratio(dye, ratio, &state.state()?),
        Commands::Ta {
            ph,
            sample_mass,
            acid_mass,
            acid_concentration,
            state,
        } => {
            let sample = titration(sample_mass, acid_mass, acid_concentration, &state)?;
            let ta = ta_from_ph(ph, &sample)?;
            println!("TA = {:.2} µmol/kg", ta * MICRO);
            Ok(())
        }
        Commands::PhFromTa {
            ta,
            sample_mass,
            acid_mass,
            acid_concentration,
            state,
        } => {
            let sample = titration(sample_mass, acid_mass, acid_concentration, &state)?;
            let ph = ph_from_ta(ta / MICRO, &sample)?;
            println!("pH = {ph:.4}");
            Ok(())
        }
        Commands::AcidMass {
            ph,
            ta,
            sample_mass,
            acid_concentration,
            state,
        } => {
            let m = acid_mass_from_ph_ta(
                ph,
                ta / MICRO,
                grams(sample_mass),
                &state.state()?,
                acid_concentration,
            )?;
            println!("acid mass = {:.4} g", as_grams(m));
            Ok(())
        }
        Commands::TrisPh { state } => {
            println!("pH(Tris) = {:.4}", tris_buffer_ph(&state.state()?));
            Ok(())
        }
    }
}

fn titration(
    sample_mass: f64,
    acid_mass: f64,
    acid_concentration: f64,
    state: &StateArgs,
) -> AppResult<TitrationSample> {
    Ok(TitrationSample::new(
        grams(sample_mass),
        grams(acid_mass),
        acid_concentration,
        state.state()?,
    )?)
}

fn cmd_k(dye: Dye, calibration: KCalibration, state: &SeawaterState) -> AppResult<()> {
    info!(%dye, ?calibration, t = state.temperature_c(), s = state.salinity(), "K");
    let k = equilibrium_constant(dye, state, calibration)?;
    println!("{dye}: K = {k:.6e}, pK = {:.4}", -k.log10());
    Ok(())
}

fn cmd_ph_from_ratio(dye: Dye, ratio: f64, state: &SeawaterState) -> AppResult<()> {
    let ph = ph_from_ratio(dye, &CorrelatedValue::constant(ratio), state)?;
    println!("{dye}: pH = {:.4}", ph.nominal());
    Ok(())
}
