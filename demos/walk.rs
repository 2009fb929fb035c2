use std::path::PathBuf;
use std::time::{Duration, Instant};

use geo_narrator::{
    engines::simulated::{SimulatedLocation, SimulatedSynthesizer},
    speech::primary_voices,
    load_pois, Coordinate, FileStore, Guide, GuideConfig, GuideNotice, LanguageSettings,
    LocationTracker, Poi,
};

/// Straight-line fixes from `from` to `to`, roughly `step_m` apart.
fn leg(from: &Coordinate, to: &Coordinate, step_m: f64) -> Vec<Coordinate> {
    let length = from.distance_to(to.latitude, to.longitude);
    let steps = (length / step_m).ceil().max(1.0) as usize;
    (1..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            Coordinate::new(
                from.latitude + (to.latitude - from.latitude) * t,
                from.longitude + (to.longitude - from.longitude) * t,
            )
            .with_accuracy(5.0)
        })
        .collect()
}

fn route_through(pois: &[Poi]) -> Vec<Coordinate> {
    let mut route = Vec::new();
    let mut here = Coordinate::new(52.2440, 21.0170);
    for poi in pois {
        let next = Coordinate::new(poi.latitude, poi.longitude);
        route.extend(leg(&here, &next, 15.0));
        // Linger so the narration can finish.
        route.extend(std::iter::repeat(next).take(40));
        here = next;
    }
    route
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let pois_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| manifest_dir.join("demos/pois.json"));
    let config = match std::env::args().nth(2) {
        Some(path) => GuideConfig::from_json_file(&PathBuf::from(path))?,
        None => GuideConfig::default(),
    };

    let pois = load_pois(&pois_path)?;
    let store = FileStore::new(std::env::temp_dir().join("geo-narrator-demo.json"));
    println!("Preferences stored in {}", store.path().display());
    let ui_language = LanguageSettings::load(store.clone(), &config.locale);
    println!("UI language: {}", ui_language.language());

    let route = route_through(&pois);
    println!("Walking {} fixes past {} POIs", route.len(), pois.len());

    let mut tracker = LocationTracker::activate(Some(SimulatedLocation::new(route)), config.fix_timeout());
    let mut guide = Guide::new(
        pois,
        Some(SimulatedSynthesizer::default().with_late_voices()),
        store,
        config,
    )?;

    let started = Instant::now();
    let mut now = started;
    let mut walking = true;
    while walking {
        if let Some(synth) = guide.synthesizer_mut() {
            // Voices show up a moment after start, like on some browsers.
            if now.duration_since(started) >= Duration::from_secs(1) {
                synth.publish_voices();
            }
            synth.advance(now);
        }

        walking = tracker.source_mut().is_some_and(|source| source.step());
        tracker.poll();
        guide.observe_tracker(&tracker, now);
        guide.tick(now);

        for notice in guide.take_notices() {
            match notice {
                GuideNotice::PendingPoi(id) => {
                    println!("New POI nearby: {id}, playing it");
                    guide.play_pending(now);
                }
                other => println!("Notice: {other:?}"),
            }
        }

        now += Duration::from_millis(500);
    }

    let offered = guide.available_voices();
    let names: Vec<&str> = offered.iter().map(|v| v.name.as_str()).collect();
    println!("Voices offered in settings: {names:?}");
    let primary: Vec<String> = primary_voices(&offered).into_iter().map(|v| v.name).collect();
    println!("One voice per language: {primary:?}");
    println!("Final session: {}", serde_json::to_string_pretty(&guide.session())?);
    Ok(())
}
