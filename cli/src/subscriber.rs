// Demo subscriber: prints every received ASDU, watches the sample counter
// for gaps, and feeds the channel estimates into a distance relay and a
// differential relay. With --trip-breaker a relay trip commands a demo
// breaker open.

use log::{info, warn};
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sv_core::iec_61850_9_2::common::{SmpSynch, SvDataType};
use sv_core::model::{IedClient, IedModel, LogicalNode, SampledValueControlBlock};
use sv_core::protection::{
    DifferentialProtection, DifferentialProtectionSettings, DistanceProtection,
    DistanceProtectionSettings, Phasor,
};
use sv_core::sim::Breaker;

pub fn run(
    interface: &str,
    app_id: u16,
    seconds: f64,
    trip_breaker: bool,
) -> Result<(), Box<dyn Error>> {
    let mut svcb = SampledValueControlBlock::new("SV01");
    svcb.set_app_id(app_id);
    svcb.set_smp_synch(SmpSynch::Local);
    svcb.set_data_type(SvDataType::Int32);
    let current_scale = svcb.current_scaling() as f64;
    let voltage_scale = svcb.voltage_scaling() as f64;

    let mut node = LogicalNode::new("MU01");
    node.add_control_block(svcb);
    let mut model = IedModel::new("DemoSubscriber");
    model.add_logical_node(node);
    let model = Arc::new(model);

    let breaker = Arc::new(Breaker::create());
    breaker.close();

    let distance = Arc::new(DistanceProtection::create(
        DistanceProtectionSettings::default(),
    )?);
    let differential = Arc::new(DifferentialProtection::create(
        DifferentialProtectionSettings::default(),
    )?);

    {
        let breaker = Arc::clone(&breaker);
        distance.on_trip(move |result| {
            warn!(
                "Distance trip: zones [{}{}{}], Z={:.2} ohm",
                result.zone1_trip as u8, result.zone2_trip as u8, result.zone3_trip as u8,
                result.measured_impedance_ohm
            );
            if trip_breaker {
                breaker.trip();
            }
        });
    }
    {
        let breaker = Arc::clone(&breaker);
        differential.on_trip(move |result| {
            warn!(
                "Differential trip: op={:.1}A restraint={:.1}A instantaneous={}",
                result.operating_current_a, result.restraint_current_a, result.instantaneous
            );
            if trip_breaker {
                breaker.trip();
            }
        });
    }

    let frames = Arc::new(AtomicU64::new(0));
    let gaps = Arc::new(AtomicU64::new(0));
    let last_count: Arc<Mutex<Option<u16>>> = Arc::new(Mutex::new(None));

    let mut client = IedClient::create(Arc::clone(&model), interface)?;
    {
        let frames = Arc::clone(&frames);
        let gaps = Arc::clone(&gaps);
        let last_count = Arc::clone(&last_count);
        let distance = Arc::clone(&distance);
        let differential = Arc::clone(&differential);
        let breaker = Arc::clone(&breaker);

        client.start_with_callback(move |asdu| {
            frames.fetch_add(1, Ordering::Relaxed);

            let mut last = last_count.lock().unwrap();
            if let Some(prev) = *last {
                if asdu.smp_cnt != prev.wrapping_add(1) {
                    gaps.fetch_add(1, Ordering::Relaxed);
                    warn!("smpCnt gap: {} -> {}", prev, asdu.smp_cnt);
                }
            }
            *last = Some(asdu.smp_cnt);
            drop(last);

            let ia = asdu.data_set[0].scaled_int() as f64 / current_scale;
            let ib = asdu.data_set[1].scaled_int() as f64 / current_scale;
            let va = asdu.data_set[4].scaled_int() as f64 / voltage_scale;

            info!(
                "ASDU {} smpCnt={} synch={} Ia={:.1}A Va={:.1}V",
                asdu.sv_id, asdu.smp_cnt, asdu.smp_synch, ia, va
            );

            let distance_result =
                distance.update(Phasor::new(va, 0.0), Phasor::new(ia, 0.0));
            let differential_result =
                differential.update(Phasor::new(ia, 0.0), Phasor::new(ib, 0.0));

            if (distance_result.tripped() || differential_result.trip) && trip_breaker {
                breaker.set_current(0.0);
            }
        })?;
    }

    info!("Listening on {} for {}s", client.interface(), seconds);
    std::thread::sleep(Duration::from_secs_f64(seconds));
    client.stop();

    info!(
        "Done: {} frames, {} smpCnt gaps, breaker state {}",
        frames.load(Ordering::Relaxed),
        gaps.load(Ordering::Relaxed),
        breaker.state()
    );
    Ok(())
}
