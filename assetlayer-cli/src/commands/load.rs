//! Commands that load and decode an asset: `json`, `image`, `audio`.

use assetlayer::Assets;

use crate::error::CliError;

/// Print a JSON document or sub-value, pretty-printed.
pub fn run_json(assets: &Assets, path: &str) -> Result<(), CliError> {
    let value = assets.json(path)?;
    let rendered =
        serde_json::to_string_pretty(value.as_ref()).map_err(|e| CliError::Output(e.to_string()))?;
    println!("{}", rendered);
    Ok(())
}

/// Print image dimensions and its frames.
pub fn run_image(assets: &Assets, path: &str) -> Result<(), CliError> {
    let record = assets.image_record(path)?;
    let (width, height) = record.image.dimensions();

    println!("Image:  {}", path);
    println!("Size:   {}x{}", width, height);
    if record.alias {
        println!("Alias:  shares pixels with another cached image");
    }

    match &record.frames {
        Some(frames) => {
            println!(
                "Frames: {} ({} frames, {} aliases)",
                frames.frames_file,
                frames.frames.len(),
                frames.aliases.len()
            );
            for (name, rect) in &frames.frames {
                println!(
                    "  {:<16} [{}, {}, {}, {}]",
                    name, rect.x0, rect.y0, rect.x1, rect.y1
                );
            }
            for (alias, target) in &frames.aliases {
                println!("  {:<16} -> {}", alias, target);
            }
        }
        None => println!("Frames: none"),
    }
    Ok(())
}

/// Print audio format details.
pub fn run_audio(assets: &Assets, path: &str) -> Result<(), CliError> {
    let audio = assets.audio(path)?;

    println!("Audio:       {}", path);
    println!("Channels:    {}", audio.channels());
    println!("Sample rate: {} Hz", audio.sample_rate());
    println!("Duration:    {:.3} s", audio.duration().as_secs_f64());
    println!("Encoded:     {} bytes", audio.encoded().len());
    println!(
        "Decompress:  {}",
        if audio.duration() < assets.settings().audio_decompress_limit() {
            "yes"
        } else {
            "no (streamed)"
        }
    );
    Ok(())
}
