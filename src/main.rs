use bevy::prelude::*;
use bevy::window::WindowResolution;
use rand::Rng;

use gameflow::config::{load_flow_config, FlowConfig, CONFIG_PATH};
use gameflow::director::Director;
use gameflow::events::{BossHandle, Signal};
use gameflow::phase::PhaseKind;
use gameflow::plugin::FlowPlugin;
use gameflow::services::SharedCensus;

/// Stand-in combat layer: kills enemies at random and eventually sends a boss.
struct DemoCombat {
    census: SharedCensus,
    config: FlowConfig,
    next_boss: u64,
    boss_sent: bool,
    /// Floating reward text for the latest kill, when damage numbers are on.
    last_hit: Option<String>,
}

/// Tags the single HUD text node.
#[derive(Component)]
struct FlowHud;

fn setup_scene(mut commands: Commands) {
    commands.spawn(Camera2d);
    commands.spawn((
        Text::new(""),
        TextFont {
            font_size: 18.0,
            ..default()
        },
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(16.0),
            top: Val::Px(16.0),
            ..default()
        },
        FlowHud,
    ));
}

/// Hand the demo census to the core before the boot phase runs.
fn attach_census(combat: NonSend<DemoCombat>, mut director: NonSendMut<Director>) {
    director.services_mut().set_census(combat.census.clone());
}

fn demo_combat_system(
    time: Res<Time<Virtual>>,
    mut combat: NonSendMut<DemoCombat>,
    mut director: NonSendMut<Director>,
) {
    match director.current_kind() {
        Some(PhaseKind::Gameplay) => {}
        Some(PhaseKind::Paused) | None => return,
        Some(_) => {
            // Re-arm the arena for the next run.
            combat.census.set_enemies(combat.config.starting_enemies);
            combat.census.set_boss(false);
            combat.boss_sent = false;
            combat.last_hit = None;
            return;
        }
    }
    let set_up = director
        .current()
        .is_some_and(|phase| phase.inspect(|p| p.as_gameplay().is_some_and(|g| g.is_scene_loaded())));
    if !set_up {
        return;
    }

    let dt = time.delta_secs_f64();
    let mut rng = rand::thread_rng();
    let (enemies, boss) = director.services().census();

    if enemies > 0 && rng.gen_bool((combat.config.death_chance_per_second * dt).min(1.0)) {
        combat.census.set_enemies(enemies - 1);
        let reward = combat.config.kill_reward;
        if let Some(ledger) = director.services().currency() {
            ledger.earn(reward);
        }
        let show_numbers = director
            .services()
            .settings()
            .is_some_and(|settings| settings.show_damage_numbers());
        combat.last_hit = show_numbers.then(|| format!("+{reward}"));
        director.publish(Signal::EntityDied { is_boss: false });
    }

    if !combat.boss_sent && rng.gen_bool((combat.config.boss_chance_per_second * dt).min(1.0)) {
        combat.boss_sent = true;
        combat.next_boss += 1;
        combat.census.set_boss(true);
        director.publish(Signal::BossSpawned {
            boss: BossHandle(combat.next_boss),
        });
    } else if boss
        && enemies == 0
        && rng.gen_bool((combat.config.death_chance_per_second * dt * 0.5).min(1.0))
    {
        combat.census.set_boss(false);
        director.services_mut().shake_camera(1.0);
        director.publish(Signal::EntityDied { is_boss: true });
    }
}

/// D: the player dies.  T: back to the title screen.
fn demo_input_system(keys: Res<ButtonInput<KeyCode>>, mut director: NonSendMut<Director>) {
    if keys.just_pressed(KeyCode::KeyD) {
        director.report_player_death();
    }
    if keys.just_pressed(KeyCode::KeyT) {
        if let Err(err) = director.return_to_title() {
            error!("Could not return to title: {err}");
        }
    }
}

fn hud_system(
    director: NonSend<Director>,
    combat: NonSend<DemoCombat>,
    mut hud: Query<&mut Text, With<FlowHud>>,
) {
    let services = director.services();
    let mut lines = vec![format!(
        "Phase: {}",
        director
            .current_kind()
            .map_or("none", PhaseKind::label)
    )];
    if let (Some(scene), Some(progress)) = (services.scenes.loading_scene(), services.scenes.progress()) {
        lines.push(format!("Loading {scene}: {:.0}%", progress * 100.0));
    }
    lines.push(format!("Currency: {}", services.currency_balance()));
    if let Some(hit) = &combat.last_hit {
        lines.push(hit.clone());
    }
    if !services.tasks.is_empty() {
        lines.push(format!(
            "Waiting on {} task(s): {}",
            services.tasks.len(),
            services.tasks.names().join(", ")
        ));
    }
    if let Some(entry) = services.ui.top() {
        lines.extend(entry.overlay().lines());
    }
    if let Some(result) = director.result_summary() {
        lines.push(format!(
            "{} in {:.1}s ({:+} currency)",
            if result.victory { "VICTORY" } else { "DEFEAT" },
            result.elapsed.as_secs_f32(),
            result.currency_delta
        ));
    }
    match director.current_kind() {
        Some(PhaseKind::Title) | Some(PhaseKind::Result) => lines.push("ENTER to play".into()),
        Some(PhaseKind::Gameplay) => lines.push("ESC pause · D die · T title".into()),
        _ => {}
    }

    for mut text in hud.iter_mut() {
        text.0 = lines.join("\n");
    }
}

fn main() {
    let config = load_flow_config(CONFIG_PATH);
    let combat = DemoCombat {
        census: SharedCensus::new(config.starting_enemies, false),
        config: config.clone(),
        next_boss: 0,
        boss_sent: false,
        last_hit: None,
    };

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Game Flow".into(),
                resolution: WindowResolution::new(960, 540),
                ..Default::default()
            }),
            ..Default::default()
        }))
        .insert_resource(ClearColor(Color::BLACK))
        .insert_non_send_resource(combat)
        .add_plugins(FlowPlugin::new(config))
        .add_systems(
            Startup,
            (
                setup_scene,
                attach_census.before(gameflow::plugin::boot_director),
            ),
        )
        .add_systems(
            Update,
            (demo_input_system, demo_combat_system, hud_system)
                .chain()
                .after(gameflow::plugin::sync_virtual_time),
        )
        .run();
}
