use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    bedrock_chat::cli::main()
}
