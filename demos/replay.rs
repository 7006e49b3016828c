//! Replays recorded detections over a directory of frames and writes the
//! annotated output.
//!
//! cargo run --example replay -- <frames_dir> <detections.dets> [config.json] [out_dir]

use flowcount::replay::{HoldTracker, ReplayDetector};
use flowcount::{Error, ImageSequence, Session, SessionConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let frames_dir = args.next().expect("expected frames directory");
    let dets_file = args.next().expect("expected detections file");
    let config = match args.next() {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    let out_dir = std::path::PathBuf::from(args.next().unwrap_or_else(|| "out".to_string()));
    std::fs::create_dir_all(&out_dir)?;

    let source = ImageSequence::new(&frames_dir);
    let total = source.paths()?.len();
    let detector = ReplayDetector::load(&dets_file)?;
    tracing::info!(frames = total, recorded = detector.len(), "replaying");

    let factory: fn() -> HoldTracker = HoldTracker::default;
    let mut session = Session::new(config, source, detector, factory)?;
    session.open()?;

    let mut last = None;
    for frame in session.frames().take(total) {
        let frame = frame?;
        // skipped files shorten the pass, stop once the sequence restarts
        if last.map_or(false, |l| frame.index <= l) {
            break;
        }
        last = Some(frame.index);

        std::fs::write(out_dir.join(format!("{:06}.jpg", frame.index)), &frame.jpeg)?;
    }

    tracing::info!(
        total_in = session.total_in(),
        total_out = session.total_out(),
        inside = session.persons_inside(),
        "finished"
    );

    session.close();

    Ok(())
}
