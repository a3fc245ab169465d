use anyhow::{anyhow, Result};
use indoc::indoc;
use om_falcon::parser::FalconSample;

fn main() -> Result<()> {
    let exposition = indoc! {r#"
        # HELP node_filesystem_avail_bytes Filesystem space available to non-root users in bytes.
        # TYPE node_filesystem_avail_bytes gauge
        node_filesystem_avail_bytes{device="/dev/sda1",fstype="ext4",mountpoint="/"} 3.4e+10
        node_filesystem_avail_bytes{device="tmpfs",fstype="tmpfs",mountpoint="/run"} 8.2e+08
        # HELP node_cpu_seconds_total Seconds the CPUs spent in each mode.
        # TYPE node_cpu_seconds_total counter
        node_cpu_seconds_total{cpu="0",mode="idle"} 31894.27
        # TYPE node_disk_io_time_seconds histogram
        node_disk_io_time_seconds_bucket{le="+Inf"} 4
    "#};

    let mut args = std::env::args();

    let progname = args.next().ok_or(anyhow!("ARGV[0] was not set??"))?;
    let mut endpoint = String::from("example");

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" => {
                println!("Usage: {} [--print-exposition] [--endpoint NAME]", progname);
                return Ok(());
            }
            "--print-exposition" => {
                println!("Exposition:\n\n{}", exposition);
            }
            "--endpoint" => {
                endpoint = args.next().ok_or(anyhow!("--endpoint needs a value"))?;
            }
            arg => return Err(anyhow!("Unknown argument: {}", arg)),
        }
    }

    let samples = om_falcon::parse_falcon_samples(exposition.lines(), 60, &endpoint)
        .collect::<Result<Vec<FalconSample>, _>>()?;

    println!("{}", serde_json::to_string_pretty(&samples)?);

    Ok(())
}
