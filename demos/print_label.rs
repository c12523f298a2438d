use std::io::{self, Write};
use std::time::Duration;

use futures::StreamExt;
use image::{Rgba, RgbaImage};
use phomemo::{
    BleConnector, DeviceSelector, FooterVariant, MediaType, PrintJobParameters, Printer,
    canvas_size, is_supported, rotate_for_feed, scan,
};

/// Example: interactive label print
/// - Scans for BLE devices
/// - Lets user select device
/// - Prints a bordered test label in the chosen size
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if !is_supported().await {
        eprintln!("No Bluetooth LE adapter available.");
        return Ok(());
    }

    println!("Scanning for BLE devices for 3 seconds...");
    let devices = scan(Duration::from_secs(3)).await?;
    if devices.is_empty() {
        println!("No devices found. Make sure the printer is powered on and advertising.");
        return Ok(());
    }
    println!("Found devices:");
    for (i, d) in devices.iter().enumerate() {
        println!("  {}) id={} name={:?} rssi={:?}", i + 1, d.id, d.name, d.rssi);
    }

    let mut input = String::new();
    let chosen = loop {
        print!("Select device number to connect to (1-{}): ", devices.len());
        io::stdout().flush()?;
        input.clear();
        io::stdin().read_line(&mut input)?;
        if let Ok(n) = input.trim().parse::<usize>() {
            if n >= 1 && n <= devices.len() {
                break devices[n - 1].id.clone();
            }
        }
        println!("Invalid selection.");
    };

    let mut printer = Printer::new(BleConnector::new(DeviceSelector::Address(chosen)));
    let mut states = printer.subscribe();
    tokio::spawn(async move {
        while let Some(state) = states.next().await {
            println!("[status] {:?}", state);
        }
    });

    printer.connect().await?;

    let params = PrintJobParameters {
        width_mm: prompt_f32("Label width in mm [40]: ", 40.0)?,
        height_mm: prompt_f32("Label height in mm [12]: ", 12.0)?,
        footer: FooterVariant::Standard,
        media: MediaType::Gaps,
        extra_feed_mm: prompt_f32("Extra feed in mm [0]: ", 0.0)?,
        ..PrintJobParameters::default()
    };

    let preview = test_label(&params);
    let raster = rotate_for_feed(&preview);
    match printer.print(&raster, &params).await {
        Ok(info) => {
            println!("Print job sent.");
            println!("  raster: {}x{} px, {} bytes/row, {} bytes", info.canvas_width, info.canvas_height, info.bytes_per_row, info.total_bytes);
            println!("  header: {}", info.header_bytes);
            println!("  footer: {}", info.footer_bytes);
        }
        Err(e) => eprintln!("Print job failed: {}", e),
    }

    printer.disconnect().await;
    Ok(())
}

fn prompt_f32(msg: &str, default: f32) -> io::Result<f32> {
    print!("{msg}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().parse().unwrap_or(default))
}

/// Preview-oriented label: 2px border and a diagonal.
fn test_label(params: &PrintJobParameters) -> RgbaImage {
    let (feed_w, feed_h) = canvas_size(params.width_mm, params.height_mm, params.pixels_per_mm);
    // preview is the feed raster turned back, so its width is the feed height
    let (w, h) = (feed_h, feed_w);
    let black = Rgba([0, 0, 0, 255]);
    let mut img = RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]));
    for y in 0..h {
        for x in 0..w {
            let border = x < 2 || x + 2 >= w || y < 2 || y + 2 >= h;
            let diag = x * h / w.max(1) == y;
            if border || diag {
                img.put_pixel(x, y, black);
            }
        }
    }
    img
}
