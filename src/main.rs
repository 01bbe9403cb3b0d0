use hlsnet::driver;
use hlsnet_utils::HlsResult;

fn main() -> HlsResult<()> {
    driver::run_compiler()
}
