//! Demo exercising hierarchy propagation through every backend
//!
//! Usage: `qvvs-hierarchy [config.ron]`

use qvvs_hierarchy::hecs::Entity;
use qvvs_hierarchy::prelude::*;

fn demo_scene() -> HierarchyScene {
    let mut scene = HierarchyScene::new("Crane");
    let base = scene.add_root("base", TransformQvvs::IDENTITY);
    let boom = scene.add_child(
        base,
        "boom",
        TransformQvvs::from_translation(Vec3::new(0.0, 4.0, 0.0))
            .with_stretch(Vec3::new(1.0, 3.0, 1.0)),
    );
    let hook = scene.add_child(boom, "hook", TransformQvvs::from_translation(Vec3::new(2.0, 0.0, 0.0)));
    scene.add_mirror(hook, "hook_socket");
    scene.add_child(base, "cabin", TransformQvvs::from_translation(Vec3::new(0.0, 1.0, 1.0)));
    scene
}

fn log_transform(world: &World, label: &str, entity: Entity) {
    if let Some(t) = world.world_transform::<Continuous>(entity) {
        log::info!(
            "{label:>12}: translation {:?} scale {:.2} stretch {:?}",
            t.translation,
            t.scale,
            t.stretch
        );
    }
}

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match PropagationConfig::load_ron(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {path}: {e}");
                PropagationConfig::default()
            }
        },
        None => PropagationConfig::default(),
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_filter.as_str()))
        .init();

    let mut world = World::with_config(config);

    // Immediate
    let cranes: Vec<Vec<Entity>> = match (0..8)
        .map(|_| demo_scene().spawn_into(&mut world))
        .collect::<Result<_, _>>()
    {
        Ok(cranes) => cranes,
        Err(e) => {
            eprintln!("Failed to spawn scene: {e}");
            return;
        }
    };
    let first = &cranes[0];

    let _ = world.write_transform::<Continuous>(
        first[0],
        TransformWrite::RotationDelta(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)),
    );
    let _ = world.write_transform::<Continuous>(first[1], TransformWrite::ScaleDelta(1.5));
    let rejected = world.write_transform::<Continuous>(first[3], TransformWrite::ScaleDelta(9.0));
    log::info!("write to mirror: {:?}", rejected.status);
    for (label, &entity) in ["base", "boom", "hook", "hook_socket", "cabin"].iter().zip(first) {
        log_transform(&world, label, entity);
    }

    // Brokered
    {
        let request = BrokerRequest::for_channel::<Continuous>().merge(&BrokerRequest::for_channel::<Ticked>());
        let mut broker = world.broker(request);
        for crane in &cranes[1..4] {
            let _ = broker.write_transform::<Continuous>(crane[2], TransformWrite::TranslationDelta(Vec3::NEG_Y));
            let _ = broker.write_transform::<Ticked>(crane[0], TransformWrite::TranslationDelta(Vec3::X));
        }
    }

    // Scoped, one worker per crane
    let writes: Vec<_> = cranes
        .iter()
        .enumerate()
        .map(|(i, crane)| {
            (
                crane[0],
                TransformWrite::TranslationDelta(Vec3::new(i as f32 * 10.0, 0.0, 0.0)),
            )
        })
        .collect();
    let reports = par_write_transforms::<Continuous>(&mut world, &writes);
    let touched: usize = reports.iter().map(|report| report.written).sum();
    log::info!("parallel pass wrote {} transforms", touched);

    // Tear down one crane and keep writing through its orphans
    let doomed = &cranes[7];
    if let Err(e) = world.despawn(doomed[0]) {
        log::warn!("despawn failed: {e}");
    }
    let orphan = world.write_transform::<Continuous>(doomed[1], TransformWrite::ScaleDelta(2.0));
    log::info!("write through cleanup record: {:?}", orphan.status);

    let maintenance = world.end_frame();
    log::info!("end of frame: {:?}", maintenance);
    let standalone = world.write_transform::<Continuous>(doomed[1], TransformWrite::ScaleDelta(2.0));
    log::info!("write after expiry: {:?}", standalone.status);

    log::info!("{}", world.stats().summary());
}
