use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use rdft_net::UdpTransport;
use rdft_proto::{Packet, RequestOp, ResponseSub};

use crate::archive;
use crate::cli::Cli;
use crate::transfer;

/// What the client authenticates as, folded from `--user`/`--password`.
struct Credentials {
    anonymous: bool,
    user_name: String,
    password: String,
}

impl Credentials {
    fn from_cli(cli: &Cli) -> Self {
        match &cli.user {
            Some(user_name) => Self {
                anonymous: false,
                user_name: user_name.clone(),
                password: cli.password.clone().unwrap_or_default(),
            },
            None => Self {
                anonymous: true,
                user_name: String::new(),
                password: String::new(),
            },
        }
    }
}

fn server_addr(cli: &Cli) -> Result<SocketAddr> {
    format!("{}:{}", cli.host, cli.port)
        .to_socket_addrs()
        .with_context(|| format!("resolving {}:{}", cli.host, cli.port))?
        .next()
        .context("server address resolved to no candidates")
}

fn bind_transport(cli: &Cli) -> Result<UdpTransport> {
    let local = format!("{}:{}", cli.client_host, cli.client_port);
    UdpTransport::bind(&local, Duration::from_millis(rdft_proto::SOCKET_TIMEOUT_MS))
        .with_context(|| format!("binding client socket on {local}"))
}

pub fn run_upload(cli: &Cli, src: &Path, dest: Option<&str>) -> Result<()> {
    let creds = Credentials::from_cli(cli);
    let addr = server_addr(cli)?;
    let mut transport = bind_transport(cli)?;

    let metadata = fs::metadata(src).with_context(|| format!("reading {}", src.display()))?;
    let is_file = metadata.is_file();
    let body = if is_file {
        fs::read(src).with_context(|| format!("reading {}", src.display()))?
    } else {
        archive::zip_directory(src)?
    };

    let dest_path = dest.map(ToString::to_string).unwrap_or_else(|| {
        src.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let mut framed = Vec::with_capacity(body.len() + 1);
    framed.push(u8::from(is_file));
    framed.extend_from_slice(&body);

    let request = Packet::Request {
        request_id: 0,
        data_size: framed.len() as u32,
        max_segment_size: rdft_proto::SINGLE_SEGMENT_SIZE_MAX,
        anonymous: creds.anonymous,
        user_name: creds.user_name,
        password: creds.password,
        op: RequestOp::Upload { path: dest_path },
    };

    let negotiated = transfer::send_request(&mut transport, addr, &request)?;
    if negotiated.segments_amount == 0 {
        println!("uploaded 0 bytes");
        return Ok(());
    }

    transfer::upload_stream(
        &mut transport,
        addr,
        negotiated.request_id,
        &framed,
        negotiated.single_segment_size,
        negotiated.segments_amount,
        rdft_proto::CWND_START,
    )?;
    println!("uploaded {} bytes", framed.len());
    Ok(())
}

pub fn run_download(cli: &Cli, src: &str, dest: &Path) -> Result<()> {
    let creds = Credentials::from_cli(cli);
    let addr = server_addr(cli)?;
    let mut transport = bind_transport(cli)?;

    let request = Packet::Request {
        request_id: 0,
        data_size: 0,
        max_segment_size: rdft_proto::SINGLE_SEGMENT_SIZE_MAX,
        anonymous: creds.anonymous,
        user_name: creds.user_name,
        password: creds.password,
        op: RequestOp::Download { path: src.to_string() },
    };

    let negotiated = transfer::send_request(&mut transport, addr, &request)?;
    let framed = if negotiated.segments_amount == 0 {
        Vec::new()
    } else {
        transfer::download_stream(&mut transport, addr, &negotiated)?
    };

    let Some((&is_file_byte, body)) = framed.split_first() else {
        fs::write(dest, [])?;
        return Ok(());
    };
    if is_file_byte != 0 {
        fs::write(dest, body).with_context(|| format!("writing {}", dest.display()))?;
    } else {
        archive::unzip_directory(body, dest)?;
    }
    println!("downloaded {} bytes to {}", framed.len(), dest.display());
    Ok(())
}

pub fn run_list(cli: &Cli, path: &str, recursive: bool) -> Result<()> {
    let creds = Credentials::from_cli(cli);
    let addr = server_addr(cli)?;
    let mut transport = bind_transport(cli)?;

    let request = Packet::Request {
        request_id: 0,
        data_size: 0,
        max_segment_size: rdft_proto::SINGLE_SEGMENT_SIZE_MAX,
        anonymous: creds.anonymous,
        user_name: creds.user_name,
        password: creds.password,
        op: RequestOp::List {
            path: path.to_string(),
            recursive,
        },
    };

    let negotiated = transfer::send_request(&mut transport, addr, &request)?;
    let payload = if negotiated.segments_amount == 0 {
        Vec::new()
    } else {
        transfer::download_stream(&mut transport, addr, &negotiated)?
    };

    let entries = rdft_core::list_codec::decode(&payload)?;
    print_listing(&entries);
    Ok(())
}

fn print_listing(entries: &[rdft_core::storage::ListEntry]) {
    for entry in entries {
        match entry {
            rdft_core::storage::ListEntry::Directory { name, .. } => {
                println!("{:>12}  {name}/", "<dir>");
            }
            rdft_core::storage::ListEntry::File { name, size, .. } => {
                println!("{size:>12}  {name}");
            }
        }
    }
}

pub fn run_delete(cli: &Cli, path: &str) -> Result<()> {
    let creds = Credentials::from_cli(cli);
    let addr = server_addr(cli)?;
    let mut transport = bind_transport(cli)?;

    let request = Packet::Request {
        request_id: 0,
        data_size: 0,
        max_segment_size: rdft_proto::SINGLE_SEGMENT_SIZE_MAX,
        anonymous: creds.anonymous,
        user_name: creds.user_name,
        password: creds.password,
        op: RequestOp::Delete { path: path.to_string() },
    };

    let negotiated = transfer::send_request(&mut transport, addr, &request)?;
    match negotiated.sub {
        ResponseSub::Delete { is_file: true } => println!("deleted file {path}"),
        ResponseSub::Delete { is_file: false } => println!("deleted directory {path}"),
        ResponseSub::None => bail!("server response to delete carried no result"),
    }
    Ok(())
}
