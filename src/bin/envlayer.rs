fn main() -> color_eyre::eyre::Result<()> {
    envlayer::cli::main()
}
