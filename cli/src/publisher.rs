// Demo publisher: one merging-unit model with a single control block,
// emitting a synthetic 50 Hz three-phase waveform with measurement noise.

use log::info;
use rand::Rng;
use std::error::Error;
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sv_core::iec_61850_9_2::common::{AnalogValue, SmpSynch, SvDataType};
use sv_core::model::{IedModel, IedServer, LogicalNode, SampledValueControlBlock};

pub struct PublishArgs {
    pub interface: String,
    pub svcb: String,
    pub mac: String,
    pub app_id: u16,
    pub vlan_id: u16,
    pub priority: u8,
    pub rate: f64,
    pub seconds: f64,
    pub current: f64,
    pub voltage: f64,
}

pub fn run(args: PublishArgs) -> Result<(), Box<dyn Error>> {
    if args.rate <= 0.0 || args.seconds <= 0.0 {
        return Err("rate and seconds must be positive".into());
    }

    let mut svcb = SampledValueControlBlock::new(&args.svcb);
    svcb.set_multicast_address(&args.mac);
    svcb.set_app_id(args.app_id);
    svcb.set_vlan_id(args.vlan_id);
    svcb.set_user_priority(args.priority);
    svcb.set_smp_synch(SmpSynch::Local);
    svcb.set_data_type(SvDataType::Int32);
    svcb.set_data_set("MU01/LLN0$MX$PhsMeas1".to_string());

    let mut node = LogicalNode::new("MU01");
    node.add_control_block(svcb);
    let mut model = IedModel::new("DemoMergingUnit");
    model.add_logical_node(node);
    let model = Arc::new(model);

    let mut server = IedServer::create(Arc::clone(&model), &args.interface)?;
    server.start()?;
    info!(
        "Publishing {} frames/s on {} for {}s",
        args.rate,
        server.interface(),
        args.seconds
    );

    let svcb = &model.logical_nodes()[0].control_blocks()[0];
    let current_scale = svcb.current_scaling() as f64;
    let voltage_scale = svcb.voltage_scaling() as f64;

    let mut rng = rand::thread_rng();
    let interval = Duration::from_secs_f64(1.0 / args.rate);
    let started = Instant::now();
    let mut frames: u64 = 0;

    while started.elapsed().as_secs_f64() < args.seconds {
        let t = started.elapsed().as_secs_f64();
        let omega = 2.0 * PI * 50.0 * t;

        let current_peak = args.current * 2f64.sqrt();
        let voltage_peak = args.voltage * 2f64.sqrt();
        let noise = |rng: &mut rand::rngs::ThreadRng| rng.gen_range(-0.01..0.01);

        let phase = |offset: f64, peak: f64, rng: &mut rand::rngs::ThreadRng| {
            peak * ((omega + offset).sin() + noise(rng))
        };

        let ia = phase(0.0, current_peak, &mut rng);
        let ib = phase(-2.0 * PI / 3.0, current_peak, &mut rng);
        let ic = phase(2.0 * PI / 3.0, current_peak, &mut rng);
        let va = phase(0.0, voltage_peak, &mut rng);
        let vb = phase(-2.0 * PI / 3.0, voltage_peak, &mut rng);
        let vc = phase(2.0 * PI / 3.0, voltage_peak, &mut rng);

        let values = vec![
            AnalogValue::int32((ia * current_scale) as i32),
            AnalogValue::int32((ib * current_scale) as i32),
            AnalogValue::int32((ic * current_scale) as i32),
            AnalogValue::int32(((ia + ib + ic) * current_scale) as i32),
            AnalogValue::int32((va * voltage_scale) as i32),
            AnalogValue::int32((vb * voltage_scale) as i32),
            AnalogValue::int32((vc * voltage_scale) as i32),
            AnalogValue::int32(((va + vb + vc) * voltage_scale) as i32),
        ];

        server.update_sampled_value(svcb, values);
        frames += 1;

        std::thread::sleep(interval);
    }

    server.stop();
    info!("Published {} frames", frames);
    Ok(())
}
